use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибка, которую возвращает слушатель сообщений при непредвиденном сбое.
///
/// Сбой слушателя прерывает публикацию так же, как вето, но в отличие от вето
/// возвращается вызывающему `publish`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ListenerError {
    message: String,
}

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ListenerError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ListenerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl ErrorExt for ListenerError {
    fn status_code(&self) -> StatusCode {
        StatusCode::ListenerFailed
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
