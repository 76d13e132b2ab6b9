//! Интерфейсы слушателей шины.
//!
//! Каждый интерфейс описывает одну возможность; регистрант реализует только
//! нужные ему. Методы с реализацией по умолчанию ничего не делают.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use channelbus_error::ListenerError;

use super::{Channel, ChannelId, Message, SessionRef};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Дескриптор регистрации слушателя или авторизатора; нужен для удаления.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

impl ListenerHandle {
    pub(crate) fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

/// Сила регистрации слушателя канала.
///
/// Только сильные слушатели удерживают канал от удаления сборщиком.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListenerStrength {
    #[default]
    Strong,
    Weak,
}

/// Решение слушателя сообщений.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Продолжить публикацию.
    Proceed,
    /// Отменить публикацию для всех получателей.
    Veto,
}

/// Хук настройки нового канала (инициализатор).
///
/// Вызывается ровно один раз, до уведомления "channel added".
pub trait ChannelInitializer: Send + Sync {
    fn configure_channel(
        &self,
        channel: &Channel,
    );
}

impl<F> ChannelInitializer for F
where
    F: Fn(&Channel) + Send + Sync,
{
    fn configure_channel(
        &self,
        channel: &Channel,
    ) {
        self(channel)
    }
}

/// Инициализатор, делающий канал постоянным.
#[derive(Debug, Clone, Copy, Default)]
pub struct Persistent;

impl ChannelInitializer for Persistent {
    fn configure_channel(
        &self,
        channel: &Channel,
    ) {
        channel.set_persistent(true);
    }
}

/// Глобальный слушатель жизненного цикла каналов.
pub trait ChannelLifecycleListener: Send + Sync {
    /// Настройка только что созданного канала (до пользовательских
    /// инициализаторов).
    fn configure_channel(
        &self,
        _channel: &Channel,
    ) {
    }

    fn channel_added(
        &self,
        _channel: &Arc<Channel>,
    ) {
    }

    fn channel_removed(
        &self,
        _channel: &ChannelId,
    ) {
    }
}

/// Слушатель подписок: локальный для канала или глобальный для сервера.
pub trait SubscriptionListener: Send + Sync {
    fn subscribed(
        &self,
        _session: &SessionRef,
        _channel: &Channel,
    ) {
    }

    fn unsubscribed(
        &self,
        _session: &SessionRef,
        _channel: &Channel,
    ) {
    }
}

/// Слушатель сообщений канала: может изменить сообщение или наложить вето.
pub trait MessageListener: Send + Sync {
    fn on_message(
        &self,
        from: Option<&SessionRef>,
        channel: &Channel,
        message: &mut Message,
    ) -> Result<Disposition, ListenerError>;
}

/// Слушатель, прикреплённый к каналу.
#[derive(Clone)]
pub enum ChannelListener {
    Message(Arc<dyn MessageListener>),
    Subscription(Arc<dyn SubscriptionListener>),
}

impl ChannelListener {
    pub fn message(listener: impl MessageListener + 'static) -> Self {
        Self::Message(Arc::new(listener))
    }

    pub fn subscription(listener: impl SubscriptionListener + 'static) -> Self {
        Self::Subscription(Arc::new(listener))
    }

    /// Слушатель сообщений из замыкания.
    pub fn message_fn<F>(f: F) -> Self
    where
        F: Fn(Option<&SessionRef>, &Channel, &mut Message) -> Result<Disposition, ListenerError>
            + Send
            + Sync
            + 'static,
    {
        Self::Message(Arc::new(MessageFn(f)))
    }

    pub(crate) fn as_message(&self) -> Option<&Arc<dyn MessageListener>> {
        match self {
            Self::Message(listener) => Some(listener),
            Self::Subscription(_) => None,
        }
    }

    pub(crate) fn as_subscription(&self) -> Option<&Arc<dyn SubscriptionListener>> {
        match self {
            Self::Subscription(listener) => Some(listener),
            Self::Message(_) => None,
        }
    }
}

/// Запись о регистрации слушателя на канале.
#[derive(Clone)]
pub(crate) struct ListenerEntry {
    pub handle: ListenerHandle,
    pub listener: ChannelListener,
    pub strength: ListenerStrength,
}

/// Обёртка замыкания, см. [`ChannelListener::message_fn`].
struct MessageFn<F>(F);

impl<F> MessageListener for MessageFn<F>
where
    F: Fn(Option<&SessionRef>, &Channel, &mut Message) -> Result<Disposition, ListenerError>
        + Send
        + Sync,
{
    fn on_message(
        &self,
        from: Option<&SessionRef>,
        channel: &Channel,
        message: &mut Message,
    ) -> Result<Disposition, ListenerError> {
        (self.0)(from, channel, message)
    }
}
