use std::{
    collections::HashSet,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::{Condvar, Mutex, RwLock};

use super::{
    listener::ListenerEntry, Authorizer, ChannelId, ChannelListener, ListenerHandle,
    ListenerStrength, MessageListener, SessionRef, SubscriptionListener,
};

/// Настройки отложенной доставки. Флаг и таймаут меняются вместе.
#[derive(Debug, Clone, Copy, Default)]
struct LazyState {
    lazy: bool,
    timeout: Option<Duration>,
}

/// Узел дерева каналов.
///
/// Каналом владеет реестр; снаружи канал доступен как `Arc<Channel>`.
/// Родитель и дети хранятся как идентификаторы и разрешаются через реестр.
/// Подписчики, слушатели и авторизаторы защищены отдельными блокировками.
pub struct Channel {
    id: ChannelId,
    subscribers: RwLock<HashSet<SessionRef>>,
    listeners: RwLock<Vec<ListenerEntry>>,
    authorizers: RwLock<Vec<(ListenerHandle, Arc<dyn Authorizer>)>>,
    children: RwLock<HashSet<ChannelId>>,
    persistent: AtomicBool,
    lazy: Mutex<LazyState>,
    default_lazy_timeout: Duration,
    /// Сколько проходов сборщика канал ещё переживёт без причин для жизни.
    sweep_countdown: AtomicU32,
    grace_passes: u32,
    initialized: Mutex<bool>,
    initialized_cv: Condvar,
    removed: AtomicBool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Channel {
    pub(crate) fn new(
        id: ChannelId,
        default_lazy_timeout: Duration,
        grace_passes: u32,
    ) -> Self {
        Self {
            id,
            subscribers: RwLock::new(HashSet::new()),
            listeners: RwLock::new(Vec::new()),
            authorizers: RwLock::new(Vec::new()),
            children: RwLock::new(HashSet::new()),
            persistent: AtomicBool::new(false),
            lazy: Mutex::new(LazyState::default()),
            default_lazy_timeout,
            sweep_countdown: AtomicU32::new(grace_passes),
            grace_passes,
            initialized: Mutex::new(false),
            initialized_cv: Condvar::new(),
            removed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn parent_id(&self) -> Option<ChannelId> {
        self.id.parent()
    }

    /// `true`, если канал удалён из реестра (явно или сборщиком).
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    // === Подписчики ===

    /// Снимок текущих подписчиков.
    pub fn subscribers(&self) -> Vec<SessionRef> {
        self.subscribers.read().iter().cloned().collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_subscribed(
        &self,
        session: &SessionRef,
    ) -> bool {
        self.subscribers.read().contains(session)
    }

    pub(crate) fn add_subscriber(
        &self,
        session: &SessionRef,
    ) -> bool {
        let added = self.subscribers.write().insert(session.clone());
        self.reset_sweep();
        added
    }

    pub(crate) fn remove_subscriber(
        &self,
        session: &SessionRef,
    ) -> bool {
        self.subscribers.write().remove(session)
    }

    /// Подписчики, чьи сессии отключены.
    pub(crate) fn disconnected_subscribers(&self) -> Vec<SessionRef> {
        self.subscribers
            .read()
            .iter()
            .filter(|s| !s.is_connected())
            .cloned()
            .collect()
    }

    pub(crate) fn take_subscribers(&self) -> Vec<SessionRef> {
        self.subscribers.write().drain().collect()
    }

    // === Слушатели ===

    /// Регистрирует слушателя. Сильный слушатель удерживает канал от
    /// удаления сборщиком, слабый не удерживает.
    pub fn add_listener(
        &self,
        listener: ChannelListener,
        strength: ListenerStrength,
    ) -> ListenerHandle {
        let handle = ListenerHandle::next();
        self.listeners.write().push(ListenerEntry {
            handle,
            listener,
            strength,
        });
        if strength == ListenerStrength::Strong {
            self.reset_sweep();
        }
        handle
    }

    pub fn remove_listener(
        &self,
        handle: ListenerHandle,
    ) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|entry| entry.handle != handle);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn has_strong_listener(&self) -> bool {
        self.listeners
            .read()
            .iter()
            .any(|entry| entry.strength == ListenerStrength::Strong)
    }

    /// Снимок слушателей сообщений в порядке регистрации.
    pub(crate) fn message_listeners(&self) -> Vec<Arc<dyn MessageListener>> {
        self.listeners
            .read()
            .iter()
            .filter_map(|entry| entry.listener.as_message().cloned())
            .collect()
    }

    pub(crate) fn subscription_listeners(&self) -> Vec<Arc<dyn SubscriptionListener>> {
        self.listeners
            .read()
            .iter()
            .filter_map(|entry| entry.listener.as_subscription().cloned())
            .collect()
    }

    // === Авторизаторы ===

    pub fn add_authorizer(
        &self,
        authorizer: Arc<dyn Authorizer>,
    ) -> ListenerHandle {
        let handle = ListenerHandle::next();
        self.authorizers.write().push((handle, authorizer));
        self.reset_sweep();
        handle
    }

    pub fn remove_authorizer(
        &self,
        handle: ListenerHandle,
    ) -> bool {
        let mut authorizers = self.authorizers.write();
        let before = authorizers.len();
        authorizers.retain(|(h, _)| *h != handle);
        authorizers.len() != before
    }

    /// Снимок авторизаторов для внешнего слоя политики доступа.
    pub fn authorizers(&self) -> Vec<Arc<dyn Authorizer>> {
        self.authorizers
            .read()
            .iter()
            .map(|(_, a)| a.clone())
            .collect()
    }

    pub fn authorizer_count(&self) -> usize {
        self.authorizers.read().len()
    }

    // === Флаги ===

    pub fn is_persistent(&self) -> bool {
        self.persistent.load(Ordering::Acquire)
    }

    /// Постоянный канал никогда не удаляется сборщиком.
    pub fn set_persistent(
        &self,
        persistent: bool,
    ) {
        self.persistent.store(persistent, Ordering::Release);
        if persistent {
            self.reset_sweep();
        }
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy.lock().lazy
    }

    /// Таймаут отложенной доставки; `None`, если таймаут отключён.
    pub fn lazy_timeout(&self) -> Option<Duration> {
        self.lazy.lock().timeout
    }

    /// Включает или выключает отложенную доставку.
    ///
    /// Включение без настроенного таймаута берёт таймаут сервера по
    /// умолчанию. Выключение сбрасывает таймаут, поэтому повторное включение
    /// снова берёт значение по умолчанию.
    pub fn set_lazy(
        &self,
        lazy: bool,
    ) {
        let mut state = self.lazy.lock();
        if lazy {
            state.lazy = true;
            if state.timeout.is_none() {
                state.timeout = Some(self.default_lazy_timeout);
            }
        } else {
            *state = LazyState::default();
        }
    }

    /// Задаёт таймаут; положительный таймаут также включает отложенную
    /// доставку, нулевой равносилен `set_lazy(false)`.
    pub fn set_lazy_timeout(
        &self,
        timeout: Duration,
    ) {
        let mut state = self.lazy.lock();
        if timeout.is_zero() {
            *state = LazyState::default();
        } else {
            state.lazy = true;
            state.timeout = Some(timeout);
        }
    }

    // === Дерево ===

    /// Идентификаторы дочерних каналов, зарегистрированных в реестре.
    pub fn children(&self) -> Vec<ChannelId> {
        self.children.read().iter().cloned().collect()
    }

    pub fn has_children(&self) -> bool {
        !self.children.read().is_empty()
    }

    pub(crate) fn attach_child(
        &self,
        child: ChannelId,
    ) {
        self.children.write().insert(child);
        self.reset_sweep();
    }

    pub(crate) fn detach_child(
        &self,
        child: &ChannelId,
    ) -> bool {
        self.children.write().remove(child)
    }

    // === Жизненный цикл ===

    pub(crate) fn mark_initialized(&self) {
        let mut initialized = self.initialized.lock();
        *initialized = true;
        self.initialized_cv.notify_all();
    }

    pub(crate) fn is_initialized(&self) -> bool {
        *self.initialized.lock()
    }

    /// Ждёт, пока создатель канала не закончит его настройку.
    pub(crate) fn wait_initialized(&self) {
        let mut initialized = self.initialized.lock();
        while !*initialized {
            self.initialized_cv.wait(&mut initialized);
        }
    }

    /// Помечает канал удалённым. Возвращает `false`, если он уже был удалён.
    pub(crate) fn mark_removed(&self) -> bool {
        !self.removed.swap(true, Ordering::AcqRel)
    }

    /// Очищает слушателей и авторизаторов удалённого канала.
    pub(crate) fn clear_registrations(&self) {
        self.listeners.write().clear();
        self.authorizers.write().clear();
    }

    // === Сборщик ===

    /// Есть ли у канала причина жить: постоянство, подписчики, сильные
    /// слушатели, авторизаторы или дети.
    pub(crate) fn is_sweep_exempt(&self) -> bool {
        self.is_persistent()
            || self.subscriber_count() > 0
            || self.has_strong_listener()
            || self.authorizer_count() > 0
            || self.has_children()
    }

    pub(crate) fn reset_sweep(&self) {
        self.sweep_countdown
            .store(self.grace_passes, Ordering::Release);
    }

    /// Уменьшает счётчик на один проход. `true`, когда он дошёл до нуля.
    pub(crate) fn tick_sweep(&self) -> bool {
        let previous = self
            .sweep_countdown
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or(0);
        previous <= 1
    }

    /// Остаток счётчика сборщика.
    pub fn sweep_countdown(&self) -> u32 {
        self.sweep_countdown.load(Ordering::Acquire)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for Channel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("subscribers", &self.subscriber_count())
            .field("listeners", &self.listener_count())
            .field("authorizers", &self.authorizer_count())
            .field("persistent", &self.is_persistent())
            .field("removed", &self.is_removed())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
