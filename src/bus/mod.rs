//! Шина каналов: иерархические каналы с шаблонами, публикация и сборка
//! мусора.
//!
//! - `channel_id`: разбор идентификаторов и сопоставление шаблонов.
//! - `channel`: узел дерева каналов с подписчиками, слушателями и флагами.
//! - `registry`: таблица каналов, создание с предками, удаление, подписки.
//! - `dispatcher`: алгоритм публикации с вето и изменением сообщений.
//! - `sweeper`: многопроходная сборка неиспользуемых каналов.
//! - `server`: фасад с жизненным циклом и фоновым сборщиком.
//! - `listener`, `session`, `authorizer`, `message`: контракты с внешними
//!   участниками.
//! - `config`, `metrics`: параметры и счётчики шины.

pub mod authorizer;
pub mod channel;
pub mod channel_id;
pub mod config;
pub mod dispatcher;
pub mod listener;
pub mod message;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod session;
pub mod sweeper;

pub use authorizer::*;
pub use channel::*;
pub use channel_id::*;
pub use config::*;
pub use dispatcher::*;
pub use listener::*;
pub use message::*;
pub use metrics::*;
pub use registry::*;
pub use server::*;
pub use session::*;
pub use sweeper::{spawn_sweeper_task, SweepReport};
