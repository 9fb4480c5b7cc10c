//! Autoplay core of the Encore Discord music bot.
//!
//! The playback driver reports empty queues to [`music::ContinuationEngine`],
//! which searches the Lavalink node pool for related tracks and refills the
//! session, or tears it down when nothing new can be found.

pub mod config;
pub mod music;

pub use config::{Config, ConfigError, EnvSource, NodeDescriptor, ProcessEnv, load_node_pool};
