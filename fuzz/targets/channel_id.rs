#![no_main]

use channelbus::{ChannelId, ChannelKind};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Разбор не должен паниковать ни на каких данных.
    let Ok(id) = ChannelId::parse(data) else {
        return;
    };

    // Разобранный id печатается обратно в исходную строку.
    assert_eq!(id.as_str(), data);
    assert_eq!(id.to_string().parse::<ChannelId>().as_ref(), Ok(&id));
    assert!(id.depth() >= 1);

    if id.kind() == ChannelKind::Exact {
        for wild in id.wilds() {
            assert!(wild.matches(&id), "{wild} must match {id}");
        }
    }
    if let Some(parent) = id.parent() {
        assert_eq!(parent.depth() + 1, id.depth());
    }
});
