#![no_main]

use arbitrary::Arbitrary;
use channelbus::{ChannelId, ChannelKind};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    pattern: String,
    candidate: String,
}

fuzz_target!(|input: FuzzInput| {
    let (Ok(pattern), Ok(candidate)) = (
        ChannelId::parse(&input.pattern),
        ChannelId::parse(&input.candidate),
    ) else {
        return;
    };

    let matched = pattern.matches(&candidate);

    // Точный шаблон совпадает только с самим собой, `/**` совпадает со всем.
    match pattern.kind() {
        ChannelKind::Exact => assert_eq!(matched, pattern == candidate),
        ChannelKind::WildRoot => assert!(matched),
        ChannelKind::WildOne => {
            if matched {
                assert_eq!(pattern.depth(), candidate.depth());
            }
        }
        ChannelKind::WildDeep => {
            if matched {
                assert!(candidate.depth() >= pattern.depth());
            }
        }
    }
});
