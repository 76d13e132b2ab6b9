use std::{
    collections::VecDeque,
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use uuid::Uuid;

use super::Message;

/// Сессия клиента с точки зрения шины каналов.
///
/// За очередь сообщений и её отправку на транспорт отвечает сама сессия.
/// `enqueue` не должен блокироваться.
pub trait Session: Send + Sync + 'static {
    /// Уникальный идентификатор сессии.
    fn id(&self) -> &str;

    /// Ставит сообщение в очередь сессии.
    ///
    /// `lazy` и `lazy_timeout` подсказывают транспорту, что отправку можно
    /// отложить; `None` означает, что таймаут не задан.
    fn enqueue(
        &self,
        message: Arc<Message>,
        lazy: bool,
        lazy_timeout: Option<Duration>,
    );

    /// `false`, если сессия отключена и её подписки можно снять.
    fn is_connected(&self) -> bool;
}

/// Ссылка на сессию. Равенство и хеш определяются идентичностью объекта.
#[derive(Clone)]
pub struct SessionRef(Arc<dyn Session>);

impl SessionRef {
    pub fn new<S: Session>(session: Arc<S>) -> Self {
        Self(session)
    }

    pub fn id(&self) -> &str {
        self.0.id()
    }

    pub fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    pub(crate) fn enqueue(
        &self,
        message: Arc<Message>,
        lazy: bool,
        lazy_timeout: Option<Duration>,
    ) {
        self.0.enqueue(message, lazy, lazy_timeout);
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0).cast::<()>()
    }
}

impl PartialEq for SessionRef {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for SessionRef {}

impl Hash for SessionRef {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for SessionRef {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("SessionRef").field(&self.id()).finish()
    }
}

impl<S: Session> From<Arc<S>> for SessionRef {
    fn from(session: Arc<S>) -> Self {
        Self::new(session)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Сессия с очередью в памяти процесса
////////////////////////////////////////////////////////////////////////////////

/// Элемент очереди [`QueueSession`].
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub message: Arc<Message>,
    pub lazy: bool,
    pub lazy_timeout: Option<Duration>,
}

/// Сессия с FIFO-очередью в памяти.
///
/// Подходит для внутрипроцессных потребителей и тестов: транспорт забирает
/// сообщения через [`poll`](Self::poll) или [`drain`](Self::drain).
pub struct QueueSession {
    id: String,
    queue: Mutex<VecDeque<QueuedMessage>>,
    connected: AtomicBool,
}

impl QueueSession {
    /// Создаёт подключённую сессию со случайным идентификатором.
    pub fn new() -> Arc<Self> {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            queue: Mutex::new(VecDeque::new()),
            connected: AtomicBool::new(true),
        })
    }

    /// Ссылка для регистрации в шине.
    pub fn handle(self: &Arc<Self>) -> SessionRef {
        SessionRef::new(self.clone())
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Забирает самое старое сообщение.
    pub fn poll(&self) -> Option<QueuedMessage> {
        self.queue.lock().pop_front()
    }

    /// Забирает все сообщения в порядке поступления.
    pub fn drain(&self) -> Vec<QueuedMessage> {
        self.queue.lock().drain(..).collect()
    }

    /// Помечает сессию отключённой; очередь при этом сохраняется.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl Session for QueueSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn enqueue(
        &self,
        message: Arc<Message>,
        lazy: bool,
        lazy_timeout: Option<Duration>,
    ) {
        self.queue.lock().push_back(QueuedMessage {
            message,
            lazy,
            lazy_timeout,
        });
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
