use std::{sync::Arc, time::Duration};

use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::RwLock;

use super::{
    BusMetrics, Channel, ChannelId, ChannelInitializer, ChannelLifecycleListener, ListenerHandle,
    SessionRef, SubscriptionListener,
};

type Registered<T> = RwLock<Vec<(ListenerHandle, Arc<T>)>>;

/// Реестр каналов сервера.
///
/// Плоская таблица `id → Channel`; дерево каналов восстанавливается по
/// идентификаторам родителей и детей. Создание канала атомарно по ключу:
/// при гонке ровно один вызов создаёт канал, остальные получают его же.
pub struct ChannelRegistry {
    channels: DashMap<Arc<str>, Arc<Channel>>,
    lifecycle_listeners: Registered<dyn ChannelLifecycleListener>,
    subscription_listeners: Registered<dyn SubscriptionListener>,
    default_lazy_timeout: Duration,
    grace_passes: u32,
    metrics: Arc<BusMetrics>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ChannelRegistry {
    pub fn new(
        default_lazy_timeout: Duration,
        grace_passes: u32,
        metrics: Arc<BusMetrics>,
    ) -> Self {
        Self {
            channels: DashMap::new(),
            lifecycle_listeners: RwLock::new(Vec::new()),
            subscription_listeners: RwLock::new(Vec::new()),
            default_lazy_timeout,
            grace_passes,
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<BusMetrics> {
        &self.metrics
    }

    /// Возвращает канал, создавая его и всех недостающих предков.
    ///
    /// Второй элемент равен `true`, если канал создан этим вызовом.
    /// Инициализаторы применяются только к новому каналу. Существующий канал
    /// возвращается после окончания его настройки. Инициализатор может
    /// создавать другие каналы, в том числе потомков, но не канал с тем же
    /// идентификатором: такой вызов будет ждать окончания настройки вечно.
    pub fn create_channel_if_absent(
        &self,
        id: &ChannelId,
        initializers: &[&dyn ChannelInitializer],
    ) -> (Arc<Channel>, bool) {
        let (channel, created) = self.ensure_channel(id, initializers);
        if !created {
            channel.wait_initialized();
        }
        (channel, created)
    }

    /// Создание без ожидания настройки уже существующего канала.
    ///
    /// Предки разрешаются этим же путём, поэтому потомка можно создать из
    /// инициализатора родителя.
    fn ensure_channel(
        &self,
        id: &ChannelId,
        initializers: &[&dyn ChannelInitializer],
    ) -> (Arc<Channel>, bool) {
        if let Some(existing) = self.peek(id.as_str()) {
            return (existing, false);
        }

        // Предки создаются раньше потомка.
        let parent = id
            .parent()
            .map(|parent_id| (self.ensure_channel(&parent_id, &[]).0, parent_id));

        let (channel, created) = match self.channels.entry(id.as_arc_str()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let channel = Arc::new(Channel::new(
                    id.clone(),
                    self.default_lazy_timeout,
                    self.grace_passes,
                ));
                entry.insert(channel.clone());
                (channel, true)
            }
        };
        if !created {
            return (channel, false);
        }

        if let Some((parent, parent_id)) = parent {
            self.attach_to_parent(id, parent, &parent_id);
        }

        for listener in self.lifecycle_listeners() {
            listener.configure_channel(&channel);
        }
        for initializer in initializers {
            initializer.configure_channel(&channel);
        }
        channel.mark_initialized();

        self.metrics.on_channel_created();
        tracing::debug!(channel = %id, "Channel created");

        for listener in self.lifecycle_listeners() {
            listener.channel_added(&channel);
        }

        (channel, true)
    }

    /// Прикрепляет потомка к родителю, который всё ещё зарегистрирован.
    ///
    /// Сборщик мог удалить родителя до того, как тот увидел потомка. Пока в
    /// таблице лежит именно этот родитель, удаление сборщиком проверит
    /// потомка и не состоится.
    fn attach_to_parent(
        &self,
        id: &ChannelId,
        mut parent: Arc<Channel>,
        parent_id: &ChannelId,
    ) {
        loop {
            parent.attach_child(id.clone());
            let current = self.peek(parent_id.as_str());
            if current.is_some_and(|current| Arc::ptr_eq(&current, &parent)) {
                return;
            }
            parent.detach_child(id);
            parent = self.ensure_channel(parent_id, &[]).0;
        }
    }

    /// Текущий канал с данным идентификатором. Никогда не создаёт канал.
    pub fn get_channel(
        &self,
        id: &str,
    ) -> Option<Arc<Channel>> {
        let channel = self.peek(id)?;
        channel.wait_initialized();
        Some(channel)
    }

    /// Поиск без ожидания инициализации.
    pub(crate) fn peek(
        &self,
        id: &str,
    ) -> Option<Arc<Channel>> {
        self.channels.get(id).map(|entry| entry.value().clone())
    }

    /// Снимок всех зарегистрированных каналов.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Явное удаление канала вместе со всеми потомками.
    ///
    /// Уведомления "removed" приходят сначала для потомков, затем для самого
    /// канала. Повторное удаление ничего не делает и возвращает `false`.
    pub fn remove_channel(
        &self,
        channel: &Arc<Channel>,
    ) -> bool {
        for child_id in channel.children() {
            if let Some(child) = self.peek(child_id.as_str()) {
                self.remove_channel(&child);
            }
        }
        self.unregister(channel, false)
    }

    /// Удаляет канал, если он всё ещё не имеет причин жить.
    pub(crate) fn remove_idle(
        &self,
        channel: &Arc<Channel>,
    ) -> bool {
        self.unregister(channel, true)
    }

    fn unregister(
        &self,
        channel: &Arc<Channel>,
        only_if_idle: bool,
    ) -> bool {
        let removed = self
            .channels
            .remove_if(channel.id().as_str(), |_, current| {
                Arc::ptr_eq(current, channel) && !(only_if_idle && current.is_sweep_exempt())
            })
            .is_some();
        if !removed || !channel.mark_removed() {
            return false;
        }

        if let Some(parent) = channel.parent_id().and_then(|id| self.peek(id.as_str())) {
            parent.detach_child(channel.id());
        }

        for session in channel.take_subscribers() {
            self.notify_unsubscribed(&session, channel);
        }
        channel.clear_registrations();

        self.metrics.on_channel_removed();
        tracing::debug!(channel = %channel.id(), "Channel removed");

        for listener in self.lifecycle_listeners() {
            listener.channel_removed(channel.id());
        }
        true
    }

    // === Подписки ===

    /// Подписывает сессию на канал.
    ///
    /// Возвращает `true`, если сессия не была подписана раньше; только тогда
    /// уведомляются слушатели: сначала локальные, затем глобальные.
    /// Подписка на удалённый канал невозможна.
    pub fn subscribe(
        &self,
        session: &SessionRef,
        channel: &Arc<Channel>,
    ) -> bool {
        if channel.is_removed() || !channel.add_subscriber(session) {
            return false;
        }
        for listener in channel.subscription_listeners() {
            listener.subscribed(session, channel);
        }
        for listener in self.subscription_listeners() {
            listener.subscribed(session, channel);
        }
        true
    }

    /// Отписывает сессию. Повторная отписка ничего не делает.
    pub fn unsubscribe(
        &self,
        session: &SessionRef,
        channel: &Arc<Channel>,
    ) -> bool {
        if !channel.remove_subscriber(session) {
            return false;
        }
        self.notify_unsubscribed(session, channel);
        true
    }

    /// Отписывает сессию от всех каналов. Возвращает число каналов.
    pub fn unsubscribe_all(
        &self,
        session: &SessionRef,
    ) -> usize {
        self.channels()
            .iter()
            .filter(|channel| self.unsubscribe(session, channel))
            .count()
    }

    fn notify_unsubscribed(
        &self,
        session: &SessionRef,
        channel: &Channel,
    ) {
        for listener in channel.subscription_listeners() {
            listener.unsubscribed(session, channel);
        }
        for listener in self.subscription_listeners() {
            listener.unsubscribed(session, channel);
        }
    }

    // === Глобальные слушатели ===

    pub fn add_lifecycle_listener(
        &self,
        listener: Arc<dyn ChannelLifecycleListener>,
    ) -> ListenerHandle {
        let handle = ListenerHandle::next();
        self.lifecycle_listeners.write().push((handle, listener));
        handle
    }

    pub fn remove_lifecycle_listener(
        &self,
        handle: ListenerHandle,
    ) -> bool {
        remove_registered(&self.lifecycle_listeners, handle)
    }

    pub fn add_subscription_listener(
        &self,
        listener: Arc<dyn SubscriptionListener>,
    ) -> ListenerHandle {
        let handle = ListenerHandle::next();
        self.subscription_listeners.write().push((handle, listener));
        handle
    }

    pub fn remove_subscription_listener(
        &self,
        handle: ListenerHandle,
    ) -> bool {
        remove_registered(&self.subscription_listeners, handle)
    }

    fn lifecycle_listeners(&self) -> Vec<Arc<dyn ChannelLifecycleListener>> {
        snapshot(&self.lifecycle_listeners)
    }

    fn subscription_listeners(&self) -> Vec<Arc<dyn SubscriptionListener>> {
        snapshot(&self.subscription_listeners)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Внутренние функции
////////////////////////////////////////////////////////////////////////////////

// Слушатели вызываются по снимку, без удержания блокировки.
fn snapshot<T: ?Sized>(registered: &Registered<T>) -> Vec<Arc<T>> {
    registered
        .read()
        .iter()
        .map(|(_, listener)| listener.clone())
        .collect()
}

fn remove_registered<T: ?Sized>(
    registered: &Registered<T>,
    handle: ListenerHandle,
) -> bool {
    let mut registered = registered.write();
    let before = registered.len();
    registered.retain(|(h, _)| *h != handle);
    registered.len() != before
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            mpsc, Barrier,
        },
        thread,
    };

    use parking_lot::Mutex;

    use super::*;
    use crate::bus::{Persistent, QueueSession};

    fn registry() -> ChannelRegistry {
        ChannelRegistry::new(
            Duration::from_millis(5000),
            3,
            Arc::new(BusMetrics::new()),
        )
    }

    fn id(s: &str) -> ChannelId {
        ChannelId::parse(s).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ChannelLifecycleListener for Recorder {
        fn configure_channel(
            &self,
            channel: &Channel,
        ) {
            self.events.lock().push(format!("init {}", channel.id()));
        }

        fn channel_added(
            &self,
            channel: &Arc<Channel>,
        ) {
            self.events.lock().push(format!("added {}", channel.id()));
        }

        fn channel_removed(
            &self,
            channel: &ChannelId,
        ) {
            self.events.lock().push(format!("removed {channel}"));
        }
    }

    /// Тест проверяет создание предков и порядок уведомлений.
    #[test]
    fn test_create_creates_ancestors_root_first() {
        let registry = registry();
        let recorder = Arc::new(Recorder::default());
        registry.add_lifecycle_listener(recorder.clone());

        assert!(registry.get_channel("/foo").is_none());
        let (channel, created) = registry.create_channel_if_absent(&id("/foo/bar"), &[]);
        assert!(created);
        assert_eq!(channel.id().as_str(), "/foo/bar");

        let foo = registry.get_channel("/foo").unwrap();
        assert_eq!(foo.children(), vec![id("/foo/bar")]);
        assert_eq!(
            *recorder.events.lock(),
            vec!["init /foo", "added /foo", "init /foo/bar", "added /foo/bar"]
        );

        let (again, created) = registry.create_channel_if_absent(&id("/foo/bar"), &[]);
        assert!(!created);
        assert!(Arc::ptr_eq(&channel, &again));
        assert_eq!(recorder.events.lock().len(), 4);
    }

    /// Тест проверяет, что инициализаторы не применяются к существующему каналу.
    #[test]
    fn test_initializers_only_on_creation() {
        let registry = registry();
        let calls = AtomicUsize::new(0);
        let counting = |_: &Channel| {
            calls.fetch_add(1, Ordering::SeqCst);
        };

        let initializers: [&dyn ChannelInitializer; 2] = [&Persistent, &counting];
        let (channel, _) = registry.create_channel_if_absent(&id("/root"), &initializers);
        assert!(channel.is_persistent());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let again: [&dyn ChannelInitializer; 1] = [&counting];
        registry.create_channel_if_absent(&id("/root"), &again);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Тест проверяет, что инициализатор может создать потомка
    /// настраиваемого канала.
    #[test]
    fn test_initializer_creates_child() {
        let registry = Arc::new(registry());
        let (done_tx, done_rx) = mpsc::channel();

        let worker = registry.clone();
        thread::spawn(move || {
            let with_child = |channel: &Channel| {
                let child = ChannelId::parse(&format!("{}/child", channel.id())).unwrap();
                worker.create_channel_if_absent(&child, &[]);
            };
            let initializers: [&dyn ChannelInitializer; 1] = [&with_child];
            worker.create_channel_if_absent(&id("/parent"), &initializers);
            done_tx.send(()).unwrap();
        });

        assert!(done_rx.recv_timeout(Duration::from_secs(3)).is_ok());
        let parent = registry.get_channel("/parent").unwrap();
        assert_eq!(parent.children(), vec![id("/parent/child")]);
        assert!(registry.get_channel("/parent/child").is_some());
    }

    /// Тест проверяет, что потомок не прикрепляется к уже удалённому
    /// родителю: родитель создаётся заново и получает потомка.
    #[test]
    fn test_attach_to_removed_parent_recreates_it() {
        let registry = registry();
        let (stale, _) = registry.create_channel_if_absent(&id("/a"), &[]);
        assert!(registry.remove_idle(&stale));

        registry.attach_to_parent(&id("/a/b"), stale.clone(), &id("/a"));

        assert!(!stale.has_children());
        let current = registry.get_channel("/a").unwrap();
        assert!(!Arc::ptr_eq(&current, &stale));
        assert_eq!(current.children(), vec![id("/a/b")]);
    }

    /// Тест проверяет, что при гонке канал создаётся ровно один раз.
    #[test]
    fn test_concurrent_create_single_winner() {
        let registry = Arc::new(registry());
        let recorder = Arc::new(Recorder::default());
        registry.add_lifecycle_listener(recorder.clone());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.create_channel_if_absent(&id("/race/me"), &[])
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        for (channel, _) in &results {
            assert!(Arc::ptr_eq(channel, &results[0].0));
        }
        let added = recorder
            .events
            .lock()
            .iter()
            .filter(|e| e.starts_with("added"))
            .count();
        assert_eq!(added, 2);
        assert_eq!(registry.metrics().snapshot().channels_created, 2);
    }

    /// Тест проверяет каскадное удаление: потомки раньше родителя.
    #[test]
    fn test_remove_cascades_children_first() {
        let registry = registry();
        let session = QueueSession::new().handle();
        let (bob, _) = registry.create_channel_if_absent(&id("/foo/bob"), &[]);
        registry.create_channel_if_absent(&id("/foo/*"), &[]);
        registry.subscribe(&session, &bob);

        let recorder = Arc::new(Recorder::default());
        registry.add_lifecycle_listener(recorder.clone());

        let foo = registry.get_channel("/foo").unwrap();
        assert!(registry.remove_channel(&foo));

        let events = recorder.events.lock().clone();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2], "removed /foo");
        assert!(registry.is_empty());
        assert_eq!(bob.subscriber_count(), 0);
        assert!(bob.is_removed());

        assert!(!registry.remove_channel(&foo));
        assert_eq!(recorder.events.lock().len(), 3);
    }

    /// Тест проверяет, что удаление потомка отсоединяет его от родителя.
    #[test]
    fn test_remove_detaches_from_parent() {
        let registry = registry();
        let (baz, _) = registry.create_channel_if_absent(&id("/foo/bar/baz"), &[]);
        registry.remove_channel(&baz);

        let bar = registry.get_channel("/foo/bar").unwrap();
        assert!(!bar.has_children());
        assert!(registry.get_channel("/foo").is_some());
        assert!(registry.get_channel("/foo/bar/baz").is_none());
    }

    #[test]
    fn test_unsubscribe_all() {
        let registry = registry();
        let session = QueueSession::new().handle();
        let (a, _) = registry.create_channel_if_absent(&id("/a"), &[]);
        let (b, _) = registry.create_channel_if_absent(&id("/b/*"), &[]);
        registry.subscribe(&session, &a);
        registry.subscribe(&session, &b);

        assert_eq!(registry.unsubscribe_all(&session), 2);
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        assert_eq!(registry.unsubscribe_all(&session), 0);
    }

    #[test]
    fn test_subscribe_removed_channel_fails() {
        let registry = registry();
        let session = QueueSession::new().handle();
        let (channel, _) = registry.create_channel_if_absent(&id("/gone"), &[]);
        registry.remove_channel(&channel);
        assert!(!registry.subscribe(&session, &channel));
        assert_eq!(channel.subscriber_count(), 0);
    }
}
