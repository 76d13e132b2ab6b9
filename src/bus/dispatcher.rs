use std::{collections::HashSet, sync::Arc};

use channelbus_error::PublishError;
use parking_lot::RwLock;

use super::{Channel, ChannelId, ChannelRegistry, Disposition, Message, SessionRef};

/// Проверка данных сообщения перед публикацией.
///
/// Правила задаёт внешний слой; `Err` с причиной превращается в
/// [`PublishError::InvalidMessage`].
pub trait MessageValidator: Send + Sync {
    fn validate(
        &self,
        channel: &ChannelId,
        message: &Message,
    ) -> Result<(), String>;
}

impl<F> MessageValidator for F
where
    F: Fn(&ChannelId, &Message) -> Result<(), String> + Send + Sync,
{
    fn validate(
        &self,
        channel: &ChannelId,
        message: &Message,
    ) -> Result<(), String> {
        self(channel, message)
    }
}

/// Результат публикации.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Сообщение доставлено указанному числу различных сессий.
    Delivered(usize),
    /// Слушатель канала `channel` наложил вето; никто ничего не получил.
    Vetoed { channel: ChannelId },
}

impl PublishOutcome {
    pub fn is_vetoed(&self) -> bool {
        matches!(self, Self::Vetoed { .. })
    }

    /// Число сессий, получивших сообщение (0 при вето).
    pub fn delivered(&self) -> usize {
        match self {
            Self::Delivered(n) => *n,
            Self::Vetoed { .. } => 0,
        }
    }
}

/// Маршрутизатор публикаций.
///
/// Не держит никаких блокировок на время публикации: каналы и их
/// подписчики берутся снимками.
#[derive(Default)]
pub struct Dispatcher {
    validators: RwLock<Vec<Arc<dyn MessageValidator>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_validator(
        &self,
        validator: Arc<dyn MessageValidator>,
    ) {
        self.validators.write().push(validator);
    }

    /// Публикует сообщение в канал `target`.
    ///
    /// Порядок:
    /// 1. Отклоняет шаблонный `target` и невалидные данные.
    /// 2. Собирает совпадающие каналы: точный (если есть), затем шаблоны от
    ///    самого глубокого к `/**`.
    /// 3. Вызывает слушателей сообщений по порядку. Вето или ошибка любого
    ///    слушателя отменяет доставку целиком.
    /// 4. Доставляет одно и то же сообщение каждой сессии, подписанной на
    ///    совпадающие каналы к началу публикации, ровно один раз. Флаг lazy
    ///    и таймаут берутся из точного канала.
    pub fn publish(
        &self,
        registry: &ChannelRegistry,
        from: Option<&SessionRef>,
        target: &ChannelId,
        mut message: Message,
    ) -> Result<PublishOutcome, PublishError> {
        if target.is_wild() {
            return Err(PublishError::WildcardTarget {
                channel: target.to_string(),
            });
        }

        let validators = self.validators.read().clone();
        for validator in &validators {
            validator
                .validate(target, &message)
                .map_err(|reason| PublishError::InvalidMessage {
                    channel: target.to_string(),
                    reason,
                })?;
        }

        let metrics = registry.metrics();
        metrics.on_publish();
        message.set_channel(target.clone());

        let exact = registry.get_channel(target.as_str());
        if exact.as_ref().is_some_and(|channel| channel.is_lazy()) {
            message.set_lazy(true);
        }

        let matching = matching_channels(registry, target, exact.as_ref());
        // Получатели фиксируются до слушателей: удаление канала во время
        // публикации не отнимает сообщение у уже найденных подписчиков.
        let mut recipients: Vec<SessionRef> = Vec::new();
        let mut seen: HashSet<SessionRef> = HashSet::new();
        for channel in &matching {
            for session in channel.subscribers() {
                if seen.insert(session.clone()) {
                    recipients.push(session);
                }
            }
        }

        for channel in &matching {
            for listener in channel.message_listeners() {
                match listener.on_message(from, channel, &mut message) {
                    Ok(Disposition::Proceed) => {}
                    Ok(Disposition::Veto) => {
                        metrics.on_veto();
                        tracing::debug!(
                            target_channel = %target,
                            vetoed_by = %channel.id(),
                            "Publish vetoed"
                        );
                        return Ok(PublishOutcome::Vetoed {
                            channel: channel.id().clone(),
                        });
                    }
                    Err(err) => {
                        metrics.on_listener_failure();
                        tracing::warn!(
                            target_channel = %target,
                            listener_channel = %channel.id(),
                            error = %err,
                            "Message listener failed, publish aborted"
                        );
                        return Err(PublishError::ListenerFailed {
                            channel: channel.id().to_string(),
                            reason: err.message().to_string(),
                        });
                    }
                }
            }
        }

        let lazy = message.is_lazy();
        let lazy_timeout = exact.as_ref().and_then(|channel| channel.lazy_timeout());
        let message = Arc::new(message);

        for session in &recipients {
            session.enqueue(message.clone(), lazy, lazy_timeout);
        }

        metrics.on_deliveries(recipients.len());
        Ok(PublishOutcome::Delivered(recipients.len()))
    }
}

/// Точный канал первым, затем существующие шаблонные каналы в порядке
/// [`ChannelId::wilds`].
fn matching_channels(
    registry: &ChannelRegistry,
    target: &ChannelId,
    exact: Option<&Arc<Channel>>,
) -> Vec<Arc<Channel>> {
    let wilds = target.wilds();
    let mut matching = Vec::with_capacity(wilds.len() + 1);
    matching.extend(exact.cloned());
    matching.extend(
        wilds
            .iter()
            .filter_map(|wild| registry.get_channel(wild.as_str())),
    );
    matching
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
