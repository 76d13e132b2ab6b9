use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingSettings;

/// Собирает фильтр: `RUST_LOG`, если задан, иначе уровень из настроек.
/// Некорректная директива в настройках заменяется на `info`.
pub fn build_filter_from_settings(settings: &LoggingSettings) -> EnvFilter {
    if let Ok(env_filter) = EnvFilter::try_from_default_env() {
        return env_filter;
    }

    let directive = settings.filter_directive();
    match EnvFilter::try_new(directive) {
        Ok(filter) => filter,
        Err(e) => {
            eprintln!("Invalid log filter directive '{directive}': {e}; falling back to 'info'");
            EnvFilter::new("info")
        }
    }
}
