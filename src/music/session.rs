use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use poise::serenity_prelude::{ChannelId, GuildId};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard, watch};
use tracing::{debug, info};

use super::node::TrackSearch;
use super::track::Track;

/// Number of most recent history entries consulted when deduplicating.
pub const HISTORY_LOOKBACK: usize = 25;

/// Errors that can occur when working with playback sessions
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("A playback session is already active in guild {0}")]
    AlreadyActive(GuildId),

    #[error("The playback session has been destroyed")]
    Destroyed,
}

/// Lifecycle of a playback session. There is no way back from `Destroyed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Destroyed,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<Track>,
    history: Vec<Track>,
}

impl QueueState {
    fn recent_history(&self) -> impl Iterator<Item = &Track> {
        self.history.iter().rev().take(HISTORY_LOOKBACK)
    }

    fn contains(&self, identifier: &str) -> bool {
        self.queue
            .iter()
            .chain(self.recent_history())
            .any(|track| track.id() == Some(identifier))
    }
}

/// The live playback context of one guild: its queue, what it already played,
/// the node connection it searches through and the channel it reports to.
pub struct Session {
    guild_id: GuildId,
    text_channel: ChannelId,
    search: Arc<dyn TrackSearch>,
    tracks: Mutex<QueueState>,
    state: watch::Sender<SessionState>,
    // Held for the duration of a continuation pass.
    pass_lock: AsyncMutex<()>,
}

impl Session {
    pub fn new(guild_id: GuildId, text_channel: ChannelId, search: Arc<dyn TrackSearch>) -> Self {
        let (state, _) = watch::channel(SessionState::Active);
        Self {
            guild_id,
            text_channel,
            search,
            tracks: Mutex::new(QueueState::default()),
            state,
            pass_lock: AsyncMutex::new(()),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Channel that receives the session's notices.
    pub fn text_channel(&self) -> ChannelId {
        self.text_channel
    }

    /// The search capability of the node this session plays on.
    pub fn search(&self) -> &Arc<dyn TrackSearch> {
        &self.search
    }

    // Queue mutations never panic midway, so a poisoned lock still holds
    // consistent data.
    fn tracks(&self) -> MutexGuard<'_, QueueState> {
        self.tracks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn is_empty(&self) -> bool {
        self.tracks().queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks().queue.len()
    }

    /// Add a track to the back of the queue.
    pub fn append(&self, track: Track) -> Result<(), SessionError> {
        self.append_all(vec![track]).map(|_| ())
    }

    /// Add several tracks at once, so no other mutation interleaves with them.
    /// Returns the new queue length.
    pub fn append_all(&self, tracks: Vec<Track>) -> Result<usize, SessionError> {
        let mut state = self.tracks();
        // Checked under the queue lock so a concurrent destroy cannot be missed.
        if !self.is_active() {
            return Err(SessionError::Destroyed);
        }
        state.queue.extend(tracks);
        Ok(state.queue.len())
    }

    /// Whether the identifier is queued or among the recently played tracks.
    pub fn contains(&self, identifier: &str) -> bool {
        self.tracks().contains(identifier)
    }

    /// Take the next track to play off the front of the queue.
    pub fn next(&self) -> Option<Track> {
        self.tracks().queue.pop_front()
    }

    /// Record a finished track. If it is still at the head of the queue it is
    /// moved from there, otherwise it is only appended to the history.
    pub fn mark_played(&self, track: Track) {
        let mut state = self.tracks();
        if state.queue.front() == Some(&track) {
            state.queue.pop_front();
        }
        debug!(
            "Marking '{}' as played in guild {}",
            track.title, self.guild_id
        );
        state.history.push(track);
    }

    /// Snapshot of the queued tracks, head first.
    pub fn queue(&self) -> Vec<Track> {
        self.tracks().queue.iter().cloned().collect()
    }

    /// Snapshot of the played tracks, oldest first.
    pub fn history(&self) -> Vec<Track> {
        self.tracks().history.clone()
    }

    /// Tear the session down. Returns `false` if it was already destroyed.
    pub fn destroy(&self) -> bool {
        // Take the queue lock so an in-progress append finishes first.
        let _state = self.tracks();
        let previous = self.state.send_replace(SessionState::Destroyed);
        if previous == SessionState::Active {
            info!("Destroyed playback session for guild {}", self.guild_id);
            true
        } else {
            false
        }
    }

    /// Resolves once the session has been destroyed.
    pub async fn destroyed(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = receiver
            .wait_for(|state| *state == SessionState::Destroyed)
            .await;
    }

    /// Serialize continuation passes on this session.
    pub(crate) async fn begin_pass(&self) -> AsyncMutexGuard<'_, ()> {
        self.pass_lock.lock().await
    }
}

/// Every live session, one per guild.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for the guild. A destroyed leftover is replaced; an
    /// active one is an error.
    pub fn open(
        &self,
        guild_id: GuildId,
        text_channel: ChannelId,
        search: Arc<dyn TrackSearch>,
    ) -> Result<Arc<Session>, SessionError> {
        let session = Arc::new(Session::new(guild_id, text_channel, search));

        match self.sessions.entry(guild_id) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_active() {
                    return Err(SessionError::AlreadyActive(guild_id));
                }
                entry.insert(session.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(session.clone());
            }
        }

        info!(
            "Opened playback session for guild {} (channel {})",
            guild_id, text_channel
        );
        Ok(session)
    }

    /// The guild's session, if it is still active.
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.sessions
            .get(&guild_id)
            .map(|session| session.clone())
            .filter(|session| session.is_active())
    }

    /// Destroy and forget the guild's session.
    pub fn close(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&guild_id)?;
        session.destroy();
        Some(session)
    }

    /// Destroy and forget every session. Returns how many were still active.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        self.sessions.retain(|_, session| {
            if session.destroy() {
                closed += 1;
            }
            false
        });
        closed
    }

    /// Forget every session that has been destroyed.
    pub fn prune(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.is_active());
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
