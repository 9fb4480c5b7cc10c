//! Follow-up query derivation: which search keeps the music going after a
//! given track, depending on the provider it came from.

use crate::music::node::{SearchBackend, SearchQuery};
use crate::music::platform::SearchPlatform;
use crate::music::track::Track;

/// Seeds used when the finished track carries no identifier.
pub const SPOTIFY_FALLBACK_SEED: &str = "11xbo8bGa5XTrXrGP77zwc";
pub const YOUTUBE_FALLBACK_SEED: &str = "lpeuIu-ZYJY";
pub const JIOSAAVN_FALLBACK_SEED: &str = "Hvma-gqd";

type Derivation = fn(&Track) -> SearchQuery;

/// Providers with a dedicated follow-up strategy, keyed by Lavalink source name.
/// Every other source falls back to an author search on the default platform.
const DERIVATIONS: &[(&str, Derivation)] = &[
    ("spotify", spotify_recommendations),
    ("youtube", youtube_radio),
    ("jiosaavn", jiosaavn_recommendations),
];

fn seed<'a>(track: &'a Track, fallback: &'a str) -> &'a str {
    track.id().unwrap_or(fallback)
}

fn spotify_recommendations(track: &Track) -> SearchQuery {
    SearchQuery::new(
        format!(
            "seed_tracks={}&limit=20&min_popularity=30",
            seed(track, SPOTIFY_FALLBACK_SEED)
        ),
        SearchBackend::SpotifyRecommendations,
    )
}

// The watch page of the video with its auto-generated radio mix attached.
fn youtube_radio(track: &Track) -> SearchQuery {
    let video = seed(track, YOUTUBE_FALLBACK_SEED);
    SearchQuery::new(
        format!("https://youtube.com/watch?v={}&list=RD{}", video, video),
        SearchBackend::YoutubeSearch,
    )
}

fn jiosaavn_recommendations(track: &Track) -> SearchQuery {
    SearchQuery::new(
        seed(track, JIOSAAVN_FALLBACK_SEED),
        SearchBackend::JioSaavnRecommendations,
    )
}

/// Build the follow-up query for a finished track.
///
/// Returns `None` only when the track has neither a dedicated strategy nor any
/// text (author, then title) to search for, so no empty request is ever made.
pub fn derive_query(track: &Track, default_platform: SearchPlatform) -> Option<SearchQuery> {
    if let Some((_, derive)) = DERIVATIONS
        .iter()
        .find(|(source, _)| *source == track.source)
    {
        return Some(derive(track));
    }

    [track.author.trim(), track.title.trim()]
        .into_iter()
        .find(|text| !text.is_empty())
        .map(|text| SearchQuery::new(text, SearchBackend::Platform(default_platform)))
}
