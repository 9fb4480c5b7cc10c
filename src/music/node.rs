//! Search capability of the remote Lavalink nodes.
//!
//! Audio itself never passes through the bot; nodes resolve queries into
//! [`Track`]s over their REST API and stream the audio on the driver's behalf.

use futures::future::join_all;
use poise::serenity_prelude::UserId;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::IgnoredAny;
use serenity::async_trait;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use super::platform::SearchPlatform;
use super::track::{LavalinkTrack, Track};
use crate::config::NodeDescriptor;

/// Errors that can occur while talking to a Lavalink node.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("No Lavalink node is available")]
    NoNodes,

    #[error("Node communication failure: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Node {node} answered with status {status}")]
    Status { node: String, status: StatusCode },

    #[error("Node {node} failed to load tracks: {message}")]
    LoadFailed { node: String, message: String },

    #[error("Node {node} unreachable after {attempts} attempt(s)")]
    Unreachable { node: String, attempts: u32 },
}

/// Where a query is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    /// Spotify's recommendation endpoint, seeded with track ids.
    SpotifyRecommendations,
    /// Plain YouTube video search.
    YoutubeSearch,
    /// JioSaavn's recommendation endpoint, seeded with a song id.
    JioSaavnRecommendations,
    /// One of the configurable search platforms.
    Platform(SearchPlatform),
}

impl SearchBackend {
    /// Lavalink search prefix of the backend.
    pub fn prefix(self) -> &'static str {
        match self {
            SearchBackend::SpotifyRecommendations => "sprec",
            SearchBackend::YoutubeSearch => "ytsearch",
            SearchBackend::JioSaavnRecommendations => "jsrec",
            SearchBackend::Platform(platform) => platform.search_prefix(),
        }
    }
}

/// A query bound to the backend it must be resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub backend: SearchBackend,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, backend: SearchBackend) -> Self {
        Self {
            query: query.into(),
            backend,
        }
    }

    /// The `identifier` sent to `/v4/loadtracks`. Links are loaded as they
    /// are, anything else is searched through the backend's prefix.
    pub fn identifier(&self) -> String {
        let is_link = Url::parse(&self.query)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);

        if is_link {
            self.query.clone()
        } else {
            format!("{}:{}", self.backend.prefix(), self.query)
        }
    }
}

/// Anything that can resolve a [`SearchQuery`] into tracks.
#[async_trait]
pub trait TrackSearch: Send + Sync {
    /// Resolve the query. Returned tracks are attributed to `requester`.
    async fn search(
        &self,
        query: &SearchQuery,
        requester: Option<UserId>,
    ) -> Result<Vec<Track>, ConnectionError>;
}

/// `loadType`/`data` envelope of `/v4/loadtracks`.
#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "lowercase")]
enum LoadResult {
    Track(LavalinkTrack),
    Playlist(LoadedPlaylist),
    Search(Vec<LavalinkTrack>),
    Empty(IgnoredAny),
    Error(LoadException),
}

#[derive(Debug, Deserialize)]
struct LoadedPlaylist {
    tracks: Vec<LavalinkTrack>,
}

#[derive(Debug, Deserialize)]
struct LoadException {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    cause: String,
}

impl LoadResult {
    fn into_tracks(self, node: &str) -> Result<Vec<Track>, ConnectionError> {
        match self {
            LoadResult::Track(track) => Ok(vec![track.into()]),
            LoadResult::Playlist(playlist) => {
                Ok(playlist.tracks.into_iter().map(Track::from).collect())
            }
            LoadResult::Search(tracks) => Ok(tracks.into_iter().map(Track::from).collect()),
            LoadResult::Empty(_) => Ok(Vec::new()),
            LoadResult::Error(exception) => {
                error!(
                    "Node {} failed to load tracks ({}): {}",
                    node, exception.severity, exception.cause
                );
                Err(ConnectionError::LoadFailed {
                    node: node.to_string(),
                    message: exception.message.unwrap_or(exception.cause),
                })
            }
        }
    }
}

/// REST client for a single Lavalink node.
#[derive(Debug)]
pub struct LavalinkNode {
    descriptor: NodeDescriptor,
    base_url: String,
    client: Client,
}

impl LavalinkNode {
    pub fn new(descriptor: NodeDescriptor) -> Self {
        let base_url = descriptor.base_url();
        Self {
            descriptor,
            base_url,
            client: Client::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Establish a node, probing it until it answers or its retry budget runs out.
    pub async fn connect(descriptor: NodeDescriptor) -> Result<Self, ConnectionError> {
        let node = Self::new(descriptor);
        let attempts = node.descriptor.retry_amount.max(1);

        for attempt in 1..=attempts {
            match node.version().await {
                Ok(version) => {
                    info!(
                        "Connected to Lavalink node {} at {} (version {})",
                        node.id(),
                        node.base_url,
                        version
                    );
                    return Ok(node);
                }
                Err(e) => {
                    warn!(
                        "Lavalink node {} not reachable (attempt {}/{}): {}",
                        node.id(),
                        attempt,
                        attempts,
                        e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(node.descriptor.retry_delay).await;
                    }
                }
            }
        }

        Err(ConnectionError::Unreachable {
            node: node.id().to_string(),
            attempts,
        })
    }

    async fn version(&self) -> Result<String, ConnectionError> {
        let response = self
            .client
            .get(format!("{}/version", self.base_url))
            .header("Authorization", &self.descriptor.authorization)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConnectionError::Status {
                node: self.id().to_string(),
                status: response.status(),
            });
        }

        Ok(response.text().await?.trim().to_string())
    }

    /// Resolve a raw Lavalink identifier (`ytsearch:...`, a link, ...).
    pub async fn load_tracks(&self, identifier: &str) -> Result<Vec<Track>, ConnectionError> {
        debug!("Loading '{}' on node {}", identifier, self.id());

        let response = self
            .client
            .get(format!("{}/v4/loadtracks", self.base_url))
            .query(&[("identifier", identifier)])
            .header("Authorization", &self.descriptor.authorization)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ConnectionError::Status {
                node: self.id().to_string(),
                status: response.status(),
            });
        }

        let result: LoadResult = response.json().await?;
        result.into_tracks(self.id())
    }
}

#[async_trait]
impl TrackSearch for LavalinkNode {
    async fn search(
        &self,
        query: &SearchQuery,
        requester: Option<UserId>,
    ) -> Result<Vec<Track>, ConnectionError> {
        let tracks = self.load_tracks(&query.identifier()).await?;
        Ok(tracks
            .into_iter()
            .map(|track| track.with_requester(requester))
            .collect())
    }
}

/// The connected nodes, asked in configuration order.
#[derive(Default)]
pub struct NodePool {
    nodes: Vec<LavalinkNode>,
}

impl NodePool {
    pub fn from_nodes(nodes: Vec<LavalinkNode>) -> Self {
        Self { nodes }
    }

    /// Connect every configured node concurrently. Nodes that stay unreachable
    /// are left out of the pool.
    pub async fn connect(descriptors: &[NodeDescriptor]) -> Self {
        let attempts = descriptors
            .iter()
            .cloned()
            .map(LavalinkNode::connect);

        let mut nodes = Vec::new();
        for result in join_all(attempts).await {
            match result {
                Ok(node) => nodes.push(node),
                Err(e) => error!("Dropping Lavalink node from pool: {}", e),
            }
        }

        if nodes.is_empty() {
            warn!("Node pool is empty, autoplay searches will fail");
        }
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[async_trait]
impl TrackSearch for NodePool {
    async fn search(
        &self,
        query: &SearchQuery,
        requester: Option<UserId>,
    ) -> Result<Vec<Track>, ConnectionError> {
        let mut last_error = ConnectionError::NoNodes;

        for node in &self.nodes {
            match node.search(query, requester).await {
                Ok(tracks) => return Ok(tracks),
                Err(e) => {
                    warn!("Search on node {} failed: {}", node.id(), e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}
