pub mod config;
mod filters;
mod formatter;

pub use config::{LogFormat, LoggingSettings};
pub use filters::build_filter_from_settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Инициализация логирования по настройкам.
///
/// Устанавливает глобальный subscriber; повторный вызов вернёт ошибку.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = build_filter_from_settings(settings);
    let console_layer = formatter::build_console_layer(settings.format, settings.ansi);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = settings.filter_directive(),
        log_format = %settings.format,
        "Logging system initialized"
    );
    Ok(())
}
