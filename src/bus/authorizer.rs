use super::{ChannelId, SessionRef};

/// Операция, для которой запрашивается разрешение.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Subscribe,
    Publish,
}

/// Решение авторизатора.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Grant,
    Deny,
    /// Авторизатор не высказывается; решают остальные.
    Ignore,
}

/// Авторизатор канала.
///
/// Шина только хранит авторизаторы: их наличие удерживает канал от удаления
/// сборщиком. Решения принимает внешний слой политики доступа.
pub trait Authorizer: Send + Sync {
    fn authorize(
        &self,
        operation: Operation,
        channel: &ChannelId,
        session: Option<&SessionRef>,
    ) -> Authorization;
}

/// Авторизатор, разрешающий фиксированный набор операций и игнорирующий
/// остальные.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantAuthorizer {
    create: bool,
    subscribe: bool,
    publish: bool,
}

impl GrantAuthorizer {
    pub const fn grant_all() -> Self {
        Self {
            create: true,
            subscribe: true,
            publish: true,
        }
    }

    pub const fn grant_none() -> Self {
        Self {
            create: false,
            subscribe: false,
            publish: false,
        }
    }

    pub const fn grant_create() -> Self {
        Self {
            create: true,
            ..Self::grant_none()
        }
    }

    pub const fn grant_subscribe() -> Self {
        Self {
            subscribe: true,
            ..Self::grant_none()
        }
    }

    pub const fn grant_publish() -> Self {
        Self {
            publish: true,
            ..Self::grant_none()
        }
    }
}

impl Authorizer for GrantAuthorizer {
    fn authorize(
        &self,
        operation: Operation,
        _channel: &ChannelId,
        _session: Option<&SessionRef>,
    ) -> Authorization {
        let granted = match operation {
            Operation::Create => self.create,
            Operation::Subscribe => self.subscribe,
            Operation::Publish => self.publish,
        };
        if granted {
            Authorization::Grant
        } else {
            Authorization::Ignore
        }
    }
}
