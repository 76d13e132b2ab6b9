pub mod channel;
pub mod listener;
pub mod publish;

// Публичный экспорт всех типов ошибок из вложенных модулей.
pub use channel::*;
pub use listener::*;
pub use publish::*;
