use std::any::Any;

use thiserror::Error;

use crate::{ChannelIdError, ErrorExt, StatusCode};

/// Ошибки публикации сообщений.
///
/// Вето слушателя ошибкой не является: оно отражается в результате
/// публикации, а не здесь.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    /// Строковый идентификатор целевого канала некорректен.
    #[error(transparent)]
    InvalidChannelId(#[from] ChannelIdError),

    /// Данные сообщения отклонены валидатором.
    #[error("invalid message for {channel}: {reason}")]
    InvalidMessage { channel: String, reason: String },

    /// Публикация в канал с шаблоном запрещена.
    #[error("cannot publish to wildcard channel {channel}")]
    WildcardTarget { channel: String },

    /// Слушатель сообщений завершился с ошибкой; доставка отменена.
    #[error("message listener on {channel} failed: {reason}")]
    ListenerFailed { channel: String, reason: String },
}

impl ErrorExt for PublishError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidChannelId(_) => StatusCode::InvalidChannel,
            Self::InvalidMessage { .. } => StatusCode::InvalidMessage,
            Self::WildcardTarget { .. } => StatusCode::WildcardPublish,
            Self::ListenerFailed { .. } => StatusCode::ListenerFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::InvalidChannelId(err) => err.to_string(),
            Self::InvalidMessage { reason, .. } => format!("Invalid message: {reason}"),
            Self::WildcardTarget { channel } => {
                format!("Cannot publish to wildcard channel {channel}")
            }
            Self::ListenerFailed { .. } => "Message processing failed".to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "publish".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::InvalidMessage { channel, .. }
            | Self::WildcardTarget { channel }
            | Self::ListenerFailed { channel, .. } => {
                tags.push(("channel", channel.clone()));
            }
            Self::InvalidChannelId(_) => {}
        }

        tags
    }
}
