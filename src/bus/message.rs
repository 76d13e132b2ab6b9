use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ChannelId;

/// Сообщение, проходящее через шину.
///
/// Во время публикации слушатели получают `&mut Message` по очереди, поэтому
/// изменения, сделанные ранним слушателем, видны всем последующим шагам.
/// После фазы слушателей один и тот же экземпляр (`Arc<Message>`) раздаётся
/// всем получателям.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Канал доставки, выбранный публикующим вызовом.
    #[serde(skip)]
    channel: Option<ChannelId>,
    data: Value,
    #[serde(default)]
    lazy: bool,
}

impl Message {
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            channel: None,
            data: data.into(),
            lazy: false,
        }
    }

    /// Канал, в который сообщение было опубликовано. `None` до публикации.
    pub fn channel(&self) -> Option<&ChannelId> {
        self.channel.as_ref()
    }

    pub(crate) fn set_channel(
        &mut self,
        channel: ChannelId,
    ) {
        self.channel = Some(channel);
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn set_data(
        &mut self,
        data: impl Into<Value>,
    ) {
        self.data = data.into();
    }

    /// `true`, если сообщение можно доставить с задержкой.
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    pub fn set_lazy(
        &mut self,
        lazy: bool,
    ) {
        self.lazy = lazy;
    }

    /// Builder-вариант `set_lazy(true)`.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }
}
