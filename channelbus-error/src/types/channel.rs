use std::{any::Any, fmt};

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Причина, по которой строка не является корректным идентификатором канала.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidIdReason {
    /// Пустая строка.
    Empty,
    /// Идентификатор не начинается с `/`.
    MissingLeadingSlash,
    /// Пустой сегмент (`//`, завершающий `/` или одиночный `/`).
    EmptySegment,
    /// `*` или `**` стоит не в последнем сегменте.
    MisplacedWildcard,
    /// Сегмент содержит `*` наряду с другими символами.
    PartialWildcard,
}

/// Ошибки разбора идентификаторов каналов.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelIdError {
    #[error("invalid channel id '{id}': {reason}")]
    InvalidChannelId { id: String, reason: InvalidIdReason },
}

impl ChannelIdError {
    pub fn invalid(
        id: impl Into<String>,
        reason: InvalidIdReason,
    ) -> Self {
        Self::InvalidChannelId {
            id: id.into(),
            reason,
        }
    }

    /// Возвращает причину отказа.
    pub fn reason(&self) -> InvalidIdReason {
        match self {
            Self::InvalidChannelId { reason, .. } => *reason,
        }
    }
}

impl fmt::Display for InvalidIdReason {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let text = match self {
            Self::Empty => "id is empty",
            Self::MissingLeadingSlash => "id must start with '/'",
            Self::EmptySegment => "segments must be non-empty",
            Self::MisplacedWildcard => "wildcard is allowed only as the last segment",
            Self::PartialWildcard => "wildcard must be a whole segment",
        };
        f.write_str(text)
    }
}

impl ErrorExt for ChannelIdError {
    fn status_code(&self) -> StatusCode {
        StatusCode::InvalidChannel
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let Self::InvalidChannelId { id, reason } = self;
        vec![
            ("error_type", "channel_id".to_string()),
            ("status_code", self.status_code().to_string()),
            ("channel", id.clone()),
            ("reason", reason.to_string()),
        ]
    }
}
