//! Sample tracks, ids and environments used across the integration tests.

use std::collections::HashMap;
use std::time::Duration;

use encore::music::Track;
use fake::Fake;
use fake::faker::lorem::en::Sentence;
use fake::faker::name::en::Name;
use poise::serenity_prelude::{ChannelId, GuildId, UserId};

pub const GUILD_ID: u64 = 123456789;
pub const TEXT_CHANNEL_ID: u64 = 987654321;
pub const REQUESTER_ID: u64 = 555000111;

pub fn guild() -> GuildId {
    GuildId::new(GUILD_ID)
}

pub fn text_channel() -> ChannelId {
    ChannelId::new(TEXT_CHANNEL_ID)
}

pub fn requester() -> UserId {
    UserId::new(REQUESTER_ID)
}

/// A track from `source` with random author and title.
pub fn track(source: &str, identifier: Option<&str>) -> Track {
    Track {
        encoded: format!("encoded-{}", identifier.unwrap_or("none")),
        identifier: identifier.map(str::to_string),
        source: source.to_string(),
        author: Name().fake(),
        title: Sentence(2..5).fake(),
        uri: None,
        length: Duration::from_secs((120u64..420).fake::<u64>()),
        requester: Some(requester()),
    }
}

/// `count` search results with identifiers `prefix-0`, `prefix-1`, ...
pub fn results(prefix: &str, count: usize) -> Vec<Track> {
    (0..count)
        .map(|i| track("youtube", Some(&format!("{}-{}", prefix, i))))
        .collect()
}

/// Environment describing a single node on `127.0.0.1:port`.
pub fn node_env(port: u16, platform: &str) -> HashMap<String, String> {
    HashMap::from([
        ("NODE_ID".to_string(), "local".to_string()),
        ("NODE_HOST".to_string(), "127.0.0.1".to_string()),
        ("NODE_PORT".to_string(), port.to_string()),
        ("NODE_PASSWORD".to_string(), "youshallnotpass".to_string()),
        ("DEFAULT_SEARCH_PLATFORM".to_string(), platform.to_string()),
    ])
}
