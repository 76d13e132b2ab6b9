use std::sync::Arc;

use channelbus_error::{ChannelIdError, PublishError};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::{
    sweeper, BusConfig, BusMetrics, Channel, ChannelId, ChannelInitializer, ChannelLifecycleListener,
    ChannelRegistry, Dispatcher, ListenerHandle, Message, MessageValidator, MetricsSnapshot,
    PublishOutcome, SessionRef, SubscriptionListener, SweepReport,
};

/// Сервер шины каналов.
///
/// Жизненный цикл: [`new`](Self::new) → [`start`](Self::start) (запуск
/// фонового сборщика) → операции → [`stop`](Self::stop). Операции над
/// каналами работают и без `start`; сборщик тогда вызывается вручную через
/// [`sweep`](Self::sweep).
pub struct BusServer {
    config: BusConfig,
    registry: Arc<ChannelRegistry>,
    dispatcher: Dispatcher,
    sessions: DashMap<String, SessionRef>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl BusServer {
    pub fn new(config: BusConfig) -> Self {
        let registry = ChannelRegistry::new(
            config.lazy_timeout,
            config.sweep_grace_passes,
            Arc::new(BusMetrics::new()),
        );
        Self {
            config,
            registry: Arc::new(registry),
            dispatcher: Dispatcher::new(),
            sessions: DashMap::new(),
            sweeper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Запускает периодический сборщик. Должен вызываться внутри tokio
    /// runtime. Повторный вызов на работающем сервере ничего не делает.
    pub fn start(&self) {
        let mut slot = self.sweeper.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        *slot = Some(sweeper::spawn_sweeper_task(
            self.registry.clone(),
            self.config.sweep_interval,
        ));
        tracing::info!(
            sweep_interval_ms = self.config.sweep_interval.as_millis() as u64,
            grace_passes = self.config.sweep_grace_passes,
            "Channel bus started"
        );
    }

    /// Останавливает сборщик. Каналы и подписки сохраняются.
    pub fn stop(&self) {
        if let Some(task) = self.sweeper.lock().take() {
            task.abort();
            tracing::info!("Channel bus stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    // === Каналы ===

    /// Возвращает канал, создавая его и недостающих предков.
    pub fn create_channel_if_absent(
        &self,
        id: &str,
        initializers: &[&dyn ChannelInitializer],
    ) -> Result<(Arc<Channel>, bool), ChannelIdError> {
        let id = ChannelId::parse(id)?;
        Ok(self.registry.create_channel_if_absent(&id, initializers))
    }

    /// Текущий канал или `None`. Некорректный идентификатор тоже даёт `None`.
    pub fn get_channel(
        &self,
        id: &str,
    ) -> Option<Arc<Channel>> {
        self.registry.get_channel(id)
    }

    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.registry.channels()
    }

    /// Удаляет канал вместе с потомками.
    pub fn remove_channel(
        &self,
        channel: &Arc<Channel>,
    ) -> bool {
        self.registry.remove_channel(channel)
    }

    /// Один проход сборщика.
    pub fn sweep(&self) -> SweepReport {
        sweeper::sweep(&self.registry)
    }

    // === Публикация ===

    /// Публикует сообщение в канал.
    ///
    /// Канал разрешается заново по идентификатору: публикация через
    /// удалённый канал доставляет только подписчикам шаблонов.
    pub fn publish(
        &self,
        from: Option<&SessionRef>,
        channel: &Channel,
        message: Message,
    ) -> Result<PublishOutcome, PublishError> {
        self.dispatcher
            .publish(&self.registry, from, channel.id(), message)
    }

    /// Публикует сообщение по строковому идентификатору; канал может не
    /// существовать.
    pub fn publish_to(
        &self,
        from: Option<&SessionRef>,
        id: &str,
        message: Message,
    ) -> Result<PublishOutcome, PublishError> {
        let id = ChannelId::parse(id)?;
        self.dispatcher.publish(&self.registry, from, &id, message)
    }

    pub fn add_message_validator(
        &self,
        validator: Arc<dyn MessageValidator>,
    ) {
        self.dispatcher.add_validator(validator);
    }

    // === Подписки ===

    pub fn subscribe(
        &self,
        session: &SessionRef,
        channel: &Arc<Channel>,
    ) -> bool {
        self.registry.subscribe(session, channel)
    }

    pub fn unsubscribe(
        &self,
        session: &SessionRef,
        channel: &Arc<Channel>,
    ) -> bool {
        self.registry.unsubscribe(session, channel)
    }

    // === Глобальные слушатели ===

    pub fn add_channel_listener(
        &self,
        listener: Arc<dyn ChannelLifecycleListener>,
    ) -> ListenerHandle {
        self.registry.add_lifecycle_listener(listener)
    }

    pub fn remove_channel_listener(
        &self,
        handle: ListenerHandle,
    ) -> bool {
        self.registry.remove_lifecycle_listener(handle)
    }

    pub fn add_subscription_listener(
        &self,
        listener: Arc<dyn SubscriptionListener>,
    ) -> ListenerHandle {
        self.registry.add_subscription_listener(listener)
    }

    pub fn remove_subscription_listener(
        &self,
        handle: ListenerHandle,
    ) -> bool {
        self.registry.remove_subscription_listener(handle)
    }

    // === Сессии ===

    /// Регистрирует сессию. Сессия с тем же id заменяется.
    pub fn add_session(
        &self,
        session: SessionRef,
    ) {
        self.sessions.insert(session.id().to_string(), session);
    }

    pub fn get_session(
        &self,
        id: &str,
    ) -> Option<SessionRef> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Удаляет сессию и снимает все её подписки.
    pub fn remove_session(
        &self,
        id: &str,
    ) -> Option<SessionRef> {
        let (_, session) = self.sessions.remove(id)?;
        let unsubscribed = self.registry.unsubscribe_all(&session);
        tracing::debug!(session = id, unsubscribed, "Session removed");
        Some(session)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.registry.metrics().snapshot()
    }
}

impl Default for BusServer {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl Drop for BusServer {
    fn drop(&mut self) {
        if let Some(task) = self.sweeper.get_mut().take() {
            task.abort();
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
