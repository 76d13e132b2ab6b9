/// Channel bus: channel ids, registry, dispatch, sweeping, server facade.
pub mod bus;
/// Process settings loading.
pub mod config;
/// Logging setup (formats, filters).
pub mod logging;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Channel ids and the channel tree.
pub use bus::{Channel, ChannelId, ChannelKind, ChannelRegistry};
/// Server facade and its runtime configuration.
pub use bus::{BusConfig, BusServer, MetricsSnapshot, SweepReport};
/// Publishing.
pub use bus::{Disposition, Message, MessageValidator, PublishOutcome};
/// Listener and initializer contracts.
pub use bus::{
    ChannelInitializer, ChannelLifecycleListener, ChannelListener, ListenerHandle,
    ListenerStrength, MessageListener, Persistent, SubscriptionListener,
};
/// Sessions and authorizers.
pub use bus::{
    Authorization, Authorizer, GrantAuthorizer, Operation, QueueSession, Session, SessionRef,
};
/// Error types.
pub use channelbus_error::{
    ChannelIdError, ErrorExt, InvalidIdReason, ListenerError, PublishError, StatusCode,
};
/// Settings.
pub use config::Settings;
