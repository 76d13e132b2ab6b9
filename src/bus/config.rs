use std::time::Duration;

/// Минимальное число проходов сборщика, которое переживает ненужный канал.
pub const MIN_GRACE_PASSES: u32 = 2;

/// Параметры шины каналов во время работы.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Период фонового сборщика.
    pub sweep_interval: Duration,
    /// Сколько проходов переживает канал без причин для жизни.
    pub sweep_grace_passes: u32,
    /// Таймаут отложенной доставки по умолчанию.
    pub lazy_timeout: Duration,
}

#[derive(Debug, Default)]
pub struct BusConfigBuilder {
    sweep_interval: Option<Duration>,
    sweep_grace_passes: Option<u32>,
    lazy_timeout: Option<Duration>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl BusConfig {
    pub fn builder() -> BusConfigBuilder {
        BusConfigBuilder::default()
    }
}

impl BusConfigBuilder {
    /// Нулевой период заменяется периодом по умолчанию.
    pub fn sweep_interval(
        mut self,
        interval: Duration,
    ) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Значения меньше [`MIN_GRACE_PASSES`] поднимаются до минимума.
    pub fn sweep_grace_passes(
        mut self,
        passes: u32,
    ) -> Self {
        self.sweep_grace_passes = Some(passes);
        self
    }

    pub fn lazy_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.lazy_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> BusConfig {
        let default = BusConfig::default();
        BusConfig {
            sweep_interval: self
                .sweep_interval
                .filter(|interval| !interval.is_zero())
                .unwrap_or(default.sweep_interval),
            sweep_grace_passes: self
                .sweep_grace_passes
                .unwrap_or(default.sweep_grace_passes)
                .max(MIN_GRACE_PASSES),
            lazy_timeout: self.lazy_timeout.unwrap_or(default.lazy_timeout),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для BusConfig
////////////////////////////////////////////////////////////////////////////////

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_millis(997),
            sweep_grace_passes: 3,
            lazy_timeout: Duration::from_millis(5000),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
