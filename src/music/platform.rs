//! The closed set of search platforms a guild can fall back to when the
//! finished track's provider has no dedicated follow-up strategy.

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// A search backend the Lavalink nodes can resolve plain-text queries against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchPlatform {
    Youtube,
    YoutubeMusic,
    SoundCloud,
    Spotify,
}

impl SearchPlatform {
    /// Every supported platform. Adding a backend means adding a variant here
    /// and its two names below.
    pub const ALL: [SearchPlatform; 4] = [
        SearchPlatform::Youtube,
        SearchPlatform::YoutubeMusic,
        SearchPlatform::SoundCloud,
        SearchPlatform::Spotify,
    ];

    /// The configuration name of the platform (`DEFAULT_SEARCH_PLATFORM`).
    pub fn name(self) -> &'static str {
        match self {
            SearchPlatform::Youtube => "yt",
            SearchPlatform::YoutubeMusic => "yt-music",
            SearchPlatform::SoundCloud => "soundcloud",
            SearchPlatform::Spotify => "spotify",
        }
    }

    /// The Lavalink search prefix used to build `prefix:query` identifiers.
    pub fn search_prefix(self) -> &'static str {
        match self {
            SearchPlatform::Youtube => "ytsearch",
            SearchPlatform::YoutubeMusic => "ytmsearch",
            SearchPlatform::SoundCloud => "scsearch",
            SearchPlatform::Spotify => "spsearch",
        }
    }

    /// Comma separated list of valid names, used in error messages.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|platform| platform.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SearchPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SearchPlatform {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        resolve_platform(name)
    }
}

/// Resolve a configured platform name into a [`SearchPlatform`].
///
/// Matching is exact; anything outside [`SearchPlatform::ALL`] is rejected with
/// the list of accepted names.
pub fn resolve_platform(name: &str) -> Result<SearchPlatform, ConfigError> {
    SearchPlatform::ALL
        .into_iter()
        .find(|platform| platform.name() == name)
        .ok_or_else(|| ConfigError::InvalidPlatform {
            name: name.to_string(),
            valid: SearchPlatform::valid_names(),
        })
}
