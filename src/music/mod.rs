//! Everything the bot needs to keep music playing on its Lavalink nodes.

/// Continuation passes that refill an empty queue.
pub mod autoplay;
/// Lavalink node REST clients and the search contract.
pub mod node;
/// Channel notices.
pub mod notifier;
/// The configurable default search platforms.
pub mod platform;
/// Per-guild playback sessions.
pub mod session;
/// The track model shared by every other module.
pub mod track;

pub use autoplay::{ContinuationEngine, PassOutcome};
pub use node::{ConnectionError, NodePool, SearchBackend, SearchQuery, TrackSearch};
pub use notifier::{ChannelNotifier, Notifier};
pub use platform::{SearchPlatform, resolve_platform};
pub use session::{Session, SessionError, SessionRegistry, SessionState};
pub use track::Track;
