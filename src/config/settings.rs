use std::{path::Path, time::Duration};

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{
    bus::{BusConfig, MIN_GRACE_PASSES},
    logging::LoggingSettings,
};

/// Настройки шины (секция `[bus]`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusSettings {
    /// Период фонового сборщика, мс.
    pub sweep_interval_ms: u64,
    /// Сколько проходов переживает ненужный канал; не меньше 2.
    pub sweep_grace_passes: u32,
    /// Таймаут отложенной доставки по умолчанию, мс.
    pub lazy_timeout_ms: u64,
}

/// Настройки процесса.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub bus: BusSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Загружает настройки: значения по умолчанию, затем TOML-файл (если
    /// указан), затем переменные окружения `CHANNELBUS_*`.
    ///
    /// Вложенные ключи в окружении разделяются `__`, например
    /// `CHANNELBUS_BUS__SWEEP_INTERVAL_MS=500`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            // Добавляем значения по умолчанию
            .set_default("bus.sweep_interval_ms", 997_i64)?
            .set_default("bus.sweep_grace_passes", 3_i64)?
            .set_default("bus.lazy_timeout_ms", 5000_i64)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "compact")?
            .set_default("logging.ansi", true)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let cfg = builder
            // Добавляем переменные окружения с префиксом CHANNELBUS_
            .add_source(
                Environment::with_prefix("CHANNELBUS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Self = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bus.sweep_grace_passes < MIN_GRACE_PASSES {
            return Err(ConfigError::Message(format!(
                "bus.sweep_grace_passes must be at least {MIN_GRACE_PASSES}, got {}",
                self.bus.sweep_grace_passes
            )));
        }
        if self.bus.sweep_interval_ms == 0 {
            return Err(ConfigError::Message(
                "bus.sweep_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Параметры шины для [`BusServer`](crate::bus::BusServer).
    pub fn bus_config(&self) -> BusConfig {
        BusConfig::builder()
            .sweep_interval(Duration::from_millis(self.bus.sweep_interval_ms))
            .sweep_grace_passes(self.bus.sweep_grace_passes)
            .lazy_timeout(Duration::from_millis(self.bus.lazy_timeout_ms))
            .build()
    }
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 997,
            sweep_grace_passes: 3,
            lazy_timeout_ms: 5000,
        }
    }
}
