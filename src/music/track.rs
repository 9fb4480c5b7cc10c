//! Defines [`Track`], the bot's view of a Lavalink track, and its decoding from
//! the node's REST payloads.

use poise::serenity_prelude::UserId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A playable track as resolved by a Lavalink node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque Lavalink payload the driver hands back to the node to play.
    pub encoded: String,
    /// Provider-scoped identifier (video id, Spotify id, ...), if the provider gave one.
    pub identifier: Option<String>,
    /// Lavalink source name, e.g. `youtube`, `spotify`, `soundcloud`.
    pub source: String,
    pub author: String,
    pub title: String,
    pub uri: Option<String>,
    pub length: Duration,
    /// The user the track is attributed to.
    pub requester: Option<UserId>,
}

impl Track {
    /// The identifier, ignoring blank values some providers send.
    pub fn id(&self) -> Option<&str> {
        self.identifier
            .as_deref()
            .filter(|identifier| !identifier.trim().is_empty())
    }

    /// Attribute the track to a user.
    pub fn with_requester(mut self, requester: Option<UserId>) -> Self {
        self.requester = requester;
        self
    }
}

/// Track object of the Lavalink v4 REST API.
#[derive(Debug, Deserialize)]
pub(crate) struct LavalinkTrack {
    #[serde(default)]
    encoded: String,
    info: LavalinkTrackInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LavalinkTrackInfo {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    author: String,
    #[serde(default)]
    length: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    source_name: String,
}

impl From<LavalinkTrack> for Track {
    fn from(value: LavalinkTrack) -> Self {
        let info = value.info;
        Self {
            encoded: value.encoded,
            identifier: info.identifier.filter(|id| !id.is_empty()),
            source: info.source_name,
            author: info.author,
            title: info.title,
            uri: info.uri,
            length: Duration::from_millis(info.length),
            requester: None,
        }
    }
}
