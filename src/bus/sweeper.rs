use std::{cmp::Reverse, sync::Arc, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use super::ChannelRegistry;

/// Итог одного прохода сборщика.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Сколько каналов было проверено.
    pub examined: usize,
    /// Сколько каналов удалено.
    pub removed: usize,
    /// Сколько подписок отключённых сессий снято.
    pub unsubscribed: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Внешние функции
////////////////////////////////////////////////////////////////////////////////

/// Один проход сборщика каналов.
///
/// Проход идёт в две фазы. Сначала у каждого канала снимаются подписки
/// отключённых сессий и проверяются причины жить: канал с причиной получает
/// полный счётчик. Затем каналы без причин, от самых глубоких к корню,
/// теряют по единице счётчика и удаляются на нуле. Поскольку причины
/// проверяются до любых удалений, родитель, потерявший последнего потомка
/// в этом проходе, начинает отсчёт только со следующего.
pub fn sweep(registry: &ChannelRegistry) -> SweepReport {
    let mut channels = registry.channels();
    channels.sort_by_key(|channel| Reverse(channel.id().depth()));

    let mut report = SweepReport::default();
    let mut eligible = Vec::new();
    for channel in channels {
        // Каналы в процессе настройки не трогаем.
        if channel.is_removed() || !channel.is_initialized() {
            continue;
        }
        report.examined += 1;

        for session in channel.disconnected_subscribers() {
            if registry.unsubscribe(&session, &channel) {
                report.unsubscribed += 1;
            }
        }

        if channel.is_sweep_exempt() {
            channel.reset_sweep();
        } else {
            eligible.push(channel);
        }
    }

    for channel in &eligible {
        if channel.tick_sweep() && registry.remove_idle(channel) {
            report.removed += 1;
        }
    }

    if report.removed > 0 || report.unsubscribed > 0 {
        tracing::debug!(
            examined = report.examined,
            removed = report.removed,
            unsubscribed = report.unsubscribed,
            "Sweep pass finished"
        );
    } else {
        tracing::trace!(examined = report.examined, "Sweep pass finished");
    }
    report
}

/// Запускает фоновую задачу, выполняющую проход сборщика с периодом
/// `period`.
///
/// Возвращает `JoinHandle`, через который задачу можно отменить.
pub fn spawn_sweeper_task(
    registry: Arc<ChannelRegistry>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            sweep(&registry);
        }
    })
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
