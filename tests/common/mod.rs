//! Общие помощники интеграционных тестов.

#![allow(dead_code)]

use std::sync::Arc;

use channelbus::{
    BusServer, Channel, ChannelId, ChannelLifecycleListener, ChannelListener, Disposition,
    QueueSession, SessionRef, SubscriptionListener,
};
use parking_lot::Mutex;

/// Столько проходов гарантированно удаляют любой ненужный канал.
pub const FULL_SWEEP_PASSES: usize = 12;

pub fn full_sweep(server: &BusServer) {
    for _ in 0..FULL_SWEEP_PASSES {
        server.sweep();
    }
}

/// Новая сессия, зарегистрированная на сервере.
pub fn new_session(server: &BusServer) -> Arc<QueueSession> {
    let session = QueueSession::new();
    server.add_session(session.handle());
    session
}

pub fn channel(
    server: &BusServer,
    id: &str,
) -> Arc<Channel> {
    server.create_channel_if_absent(id, &[]).unwrap().0
}

/// Слушатель сообщений, всегда пропускающий публикацию.
pub fn proceed_listener() -> ChannelListener {
    ChannelListener::message_fn(|_, _, _| Ok(Disposition::Proceed))
}

/// Глобальный слушатель жизненного цикла: считает вызовы и помнит последний.
#[derive(Default)]
pub struct LifecycleRecorder {
    state: Mutex<LifecycleState>,
}

#[derive(Default, Clone)]
pub struct LifecycleState {
    pub calls: usize,
    pub method: String,
    pub channel: Option<String>,
    pub removed: Vec<String>,
}

impl LifecycleRecorder {
    pub fn state(&self) -> LifecycleState {
        self.state.lock().clone()
    }
}

impl ChannelLifecycleListener for LifecycleRecorder {
    fn configure_channel(
        &self,
        _channel: &Channel,
    ) {
        let mut state = self.state.lock();
        state.calls += 1;
        state.method = "init".to_string();
    }

    fn channel_added(
        &self,
        channel: &Arc<Channel>,
    ) {
        let mut state = self.state.lock();
        state.calls += 1;
        state.method.push_str("added");
        state.channel = Some(channel.id().to_string());
    }

    fn channel_removed(
        &self,
        channel: &ChannelId,
    ) {
        let mut state = self.state.lock();
        state.calls += 1;
        state.method = "removed".to_string();
        state.channel = Some(channel.to_string());
        state.removed.push(channel.to_string());
    }
}

/// Слушатель подписок: помнит последний вызов.
#[derive(Default)]
pub struct SubscriptionRecorder {
    last: Mutex<Option<(String, SessionRef, String)>>,
}

impl SubscriptionRecorder {
    /// `(метод, сессия, канал)` последнего уведомления.
    pub fn last(&self) -> Option<(String, SessionRef, String)> {
        self.last.lock().clone()
    }
}

impl SubscriptionListener for SubscriptionRecorder {
    fn subscribed(
        &self,
        session: &SessionRef,
        channel: &Channel,
    ) {
        *self.last.lock() = Some((
            "subscribed".to_string(),
            session.clone(),
            channel.id().to_string(),
        ));
    }

    fn unsubscribed(
        &self,
        session: &SessionRef,
        channel: &Channel,
    ) {
        *self.last.lock() = Some((
            "unsubscribed".to_string(),
            session.clone(),
            channel.id().to_string(),
        ));
    }
}
