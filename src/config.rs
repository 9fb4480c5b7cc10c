//! Startup configuration: the Lavalink node pool and the default search platform.
//!
//! Everything here runs once before the Discord client starts. A bad value is a
//! startup failure, never something the bot limps along with.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::music::platform::{SearchPlatform, resolve_platform};

/// Connection attempts a node gets before it is considered unreachable.
pub const NODE_RETRY_AMOUNT: u32 = 20;
/// Pause between two connection attempts.
pub const NODE_RETRY_DELAY: Duration = Duration::from_millis(30_000);

/// Env prefix used when `NODE_GROUPS` is not set.
const DEFAULT_NODE_GROUP: &str = "NODE";
const NODE_GROUPS_KEY: &str = "NODE_GROUPS";
const DEFAULT_SEARCH_PLATFORM_KEY: &str = "DEFAULT_SEARCH_PLATFORM";

/// Errors that prevent the bot from starting.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration value: {0}")]
    MissingField(String),

    #[error("Invalid port in {field}: {value:?} is not a valid port number")]
    InvalidPort { field: String, value: String },

    #[error("Invalid search platform: {name}. Must be one of: {valid}")]
    InvalidPlatform { name: String, valid: String },

    #[error("Node identifier {0:?} is configured more than once")]
    DuplicateNode(String),
}

/// Read-only key/value lookup the configuration is built from.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment (after `.env` has been loaded).
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|value| value.to_string())
    }
}

/// One remote Lavalink node the bot may connect to.
#[derive(Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub authorization: String,
    pub secure: bool,
    pub retry_amount: u32,
    pub retry_delay: Duration,
}

impl NodeDescriptor {
    /// Base URL of the node's REST API.
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

// The password must never end up in logs.
impl fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("authorization", &"<redacted>")
            .field("secure", &self.secure)
            .field("retry_amount", &self.retry_amount)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

/// Process-lifetime configuration handed to the continuation engine.
#[derive(Debug, Clone)]
pub struct Config {
    pub nodes: Vec<NodeDescriptor>,
    pub default_platform: SearchPlatform,
}

impl Config {
    /// Build the whole configuration, failing on the first invalid value.
    pub fn from_env(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let nodes = load_node_pool(env)?;
        let platform_name = required(env, DEFAULT_SEARCH_PLATFORM_KEY)?;
        let default_platform = resolve_platform(&platform_name)?;

        info!(
            "Loaded {} Lavalink node(s), default search platform: {}",
            nodes.len(),
            default_platform
        );

        Ok(Self {
            nodes,
            default_platform,
        })
    }
}

/// Fetch a value that must be present and non-blank.
fn required(env: &impl EnvSource, key: &str) -> Result<String, ConfigError> {
    env.var(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingField(key.to_string()))
}

/// Env prefixes of the configured node groups.
///
/// `NODE_GROUPS` unset means the single `NODE` group; set but blank means no
/// nodes at all.
fn node_groups(env: &impl EnvSource) -> Vec<String> {
    match env.var(NODE_GROUPS_KEY) {
        None => vec![DEFAULT_NODE_GROUP.to_string()],
        Some(groups) => groups
            .split(',')
            .map(str::trim)
            .filter(|group| !group.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

fn load_node(env: &impl EnvSource, group: &str) -> Result<NodeDescriptor, ConfigError> {
    let id = required(env, &format!("{}_ID", group))?;
    let host = required(env, &format!("{}_HOST", group))?;
    let port_key = format!("{}_PORT", group);
    let port_value = required(env, &port_key)?;
    let authorization = required(env, &format!("{}_PASSWORD", group))?;

    let port = port_value
        .trim()
        .parse::<u16>()
        .map_err(|_| ConfigError::InvalidPort {
            field: port_key,
            value: port_value.clone(),
        })?;

    Ok(NodeDescriptor {
        id,
        host,
        port,
        authorization,
        secure: false,
        retry_amount: NODE_RETRY_AMOUNT,
        retry_delay: NODE_RETRY_DELAY,
    })
}

/// Materialize every configured node descriptor.
///
/// Either every group is valid and the full pool is returned, or the first
/// problem is reported and nothing is returned.
pub fn load_node_pool(env: &impl EnvSource) -> Result<Vec<NodeDescriptor>, ConfigError> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();

    for group in node_groups(env) {
        let node = load_node(env, &group)?;
        if !seen.insert(node.id.clone()) {
            return Err(ConfigError::DuplicateNode(node.id));
        }
        debug!("Configured Lavalink node {:?}", node);
        nodes.push(node);
    }

    Ok(nodes)
}
