//! Autoplay: keeps a session playing once its queue runs dry by queueing
//! tracks related to the one that just finished.

pub mod query;
pub mod sampler;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use super::notifier::Notifier;
use super::platform::SearchPlatform;
use super::session::Session;
use super::track::Track;
use crate::config::Config;
use query::derive_query;
use sampler::pick_unique;

/// Tracks queued by one successful pass.
pub const AUTOPLAY_BATCH: usize = 3;

pub const NO_RESULTS_MESSAGE: &str = "Autoplay, No results found";
pub const NO_UNIQUE_TRACK_MESSAGE: &str = "Autoplay, No unique track found";
/// How long a failure notice stays in the channel.
pub const NOTICE_LIFETIME: Duration = Duration::from_secs(10);

/// What a continuation pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// New tracks were queued and playback can resume from the queue head.
    Extended { added: usize },
    /// The queue was not empty, nothing was done.
    QueueNotEmpty,
    /// The session was already destroyed when the pass started.
    SessionInactive,
    /// No finished track to derive a follow-up from.
    NoSeed,
    /// The search failed or found nothing; the session was destroyed.
    NoResults,
    /// Every result was already queued or recently played; the session was destroyed.
    AllDuplicates,
    /// The session was destroyed from outside while the pass was running.
    Cancelled,
}

impl PassOutcome {
    /// Whether the pass tore the session down.
    pub fn destroyed_session(&self) -> bool {
        matches!(self, PassOutcome::NoResults | PassOutcome::AllDuplicates)
    }
}

/// Runs continuation passes for every session.
pub struct ContinuationEngine {
    default_platform: SearchPlatform,
    notifier: Arc<dyn Notifier>,
    rng: Mutex<StdRng>,
}

impl ContinuationEngine {
    pub fn new(config: &Config, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_platform(config.default_platform, notifier)
    }

    pub fn with_platform(default_platform: SearchPlatform, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            default_platform,
            notifier,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Replace the random source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn default_platform(&self) -> SearchPlatform {
        self.default_platform
    }

    /// Entry point for the playback driver once a session's queue is empty.
    ///
    /// Passes on the same session run one at a time; a trigger arriving while
    /// one is in flight waits for it and then usually finds the queue refilled.
    pub async fn on_queue_empty(&self, session: &Session, last_track: Option<&Track>) -> PassOutcome {
        let _pass = session.begin_pass().await;

        if !session.is_active() {
            debug!(
                "Ignoring queue-empty trigger for destroyed session in guild {}",
                session.guild_id()
            );
            return PassOutcome::SessionInactive;
        }

        if !session.is_empty() {
            debug!(
                "Queue for guild {} is not empty, autoplay not needed",
                session.guild_id()
            );
            return PassOutcome::QueueNotEmpty;
        }

        let Some(track) = last_track else {
            info!(
                "No finished track for guild {}, nothing to autoplay from",
                session.guild_id()
            );
            return PassOutcome::NoSeed;
        };

        self.continue_from(session, track).await
    }

    async fn continue_from(&self, session: &Session, track: &Track) -> PassOutcome {
        let Some(query) = derive_query(track, self.default_platform) else {
            warn!(
                "Finished track '{}' gives nothing to search for in guild {}",
                track.title,
                session.guild_id()
            );
            return self.fail(session, PassOutcome::NoResults).await;
        };

        info!(
            "Autoplay in guild {}: searching {:?} for '{}' on behalf of {:?}",
            session.guild_id(),
            query.backend,
            query.query,
            track.requester
        );

        // The search is the only await point; a stop during it wins.
        let results = tokio::select! {
            biased;
            _ = session.destroyed() => {
                info!(
                    "Session in guild {} stopped during autoplay search, discarding results",
                    session.guild_id()
                );
                return PassOutcome::Cancelled;
            }
            results = session.search().search(&query, track.requester) => results,
        };

        let candidates = match results {
            Ok(tracks) if !tracks.is_empty() => tracks,
            Ok(_) => {
                info!("Autoplay search returned no tracks in guild {}", session.guild_id());
                return self.fail(session, PassOutcome::NoResults).await;
            }
            Err(e) => {
                warn!("Autoplay search failed in guild {}: {}", session.guild_id(), e);
                return self.fail(session, PassOutcome::NoResults).await;
            }
        };

        let picks = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            pick_unique(&mut *rng, &candidates, AUTOPLAY_BATCH, |id| {
                session.contains(id)
            })
        };

        let Some(picks) = picks else {
            info!(
                "All {} autoplay candidates already played or queued in guild {}",
                candidates.len(),
                session.guild_id()
            );
            return self.fail(session, PassOutcome::AllDuplicates).await;
        };

        let added = picks.len();
        match session.append_all(picks) {
            Ok(queue_len) => {
                info!(
                    "Autoplay queued {} track(s) in guild {} (queue length {})",
                    added,
                    session.guild_id(),
                    queue_len
                );
                PassOutcome::Extended { added }
            }
            Err(_) => {
                info!(
                    "Session in guild {} stopped before autoplay tracks were queued",
                    session.guild_id()
                );
                PassOutcome::Cancelled
            }
        }
    }

    /// Notify the channel and tear the session down.
    async fn fail(&self, session: &Session, outcome: PassOutcome) -> PassOutcome {
        if !session.is_active() {
            return PassOutcome::Cancelled;
        }

        let message = match outcome {
            PassOutcome::AllDuplicates => NO_UNIQUE_TRACK_MESSAGE,
            _ => NO_RESULTS_MESSAGE,
        };

        self.notifier
            .notify(session.text_channel(), message, Some(NOTICE_LIFETIME))
            .await;
        session.destroy();

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::node::{ConnectionError, SearchBackend, SearchQuery, TrackSearch};
    use crate::music::notifier::MockNotifier;
    use crate::music::session::SessionState;
    use mockall::predicate::{always, eq};
    use poise::serenity_prelude::{ChannelId, GuildId, UserId};
    use pretty_assertions::assert_eq;
    use serenity::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Search double that replays a fixed answer and records what it was asked.
    struct StaticSearch {
        answer: Result<Vec<Track>, ()>,
        calls: AtomicUsize,
        last_query: Mutex<Option<(SearchQuery, Option<UserId>)>>,
    }

    impl StaticSearch {
        fn found(tracks: Vec<Track>) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(tracks),
                calls: AtomicUsize::new(0),
                last_query: Mutex::new(None),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                answer: Err(()),
                calls: AtomicUsize::new(0),
                last_query: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl TrackSearch for StaticSearch {
        async fn search(
            &self,
            query: &SearchQuery,
            requester: Option<UserId>,
        ) -> Result<Vec<Track>, ConnectionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_query.lock().unwrap() = Some((query.clone(), requester));
            self.answer.clone().map_err(|_| ConnectionError::NoNodes)
        }
    }

    fn track(source: &str, id: Option<&str>) -> Track {
        Track {
            encoded: format!("enc-{}", id.unwrap_or("none")),
            identifier: id.map(str::to_string),
            source: source.to_string(),
            author: "Artist".to_string(),
            title: format!("Song {}", id.unwrap_or("none")),
            uri: None,
            length: Duration::from_secs(200),
            requester: Some(UserId::new(99)),
        }
    }

    fn results(count: usize) -> Vec<Track> {
        (0..count)
            .map(|i| track("youtube", Some(&format!("r{}", i))))
            .collect()
    }

    fn engine(notifier: MockNotifier) -> ContinuationEngine {
        ContinuationEngine::with_platform(SearchPlatform::SoundCloud, Arc::new(notifier))
            .with_rng(StdRng::seed_from_u64(42))
    }

    fn silent() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();
        notifier
    }

    fn expecting(message: &'static str) -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(move |channel, text, auto_delete| {
                *channel == ChannelId::new(2)
                    && text == message
                    && *auto_delete == Some(NOTICE_LIFETIME)
            })
            .times(1)
            .return_const(());
        notifier
    }

    fn session(search: Arc<dyn TrackSearch>) -> Session {
        Session::new(GuildId::new(1), ChannelId::new(2), search)
    }

    #[tokio::test]
    async fn test_success_queues_three_tracks_silently() {
        let search = StaticSearch::found(results(10));
        let session = session(search.clone());
        let engine = engine(silent());

        let outcome = engine
            .on_queue_empty(&session, Some(&track("youtube", Some("seed"))))
            .await;

        assert_eq!(outcome, PassOutcome::Extended { added: 3 });
        assert_eq!(session.len(), 3);
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_search_is_attributed_to_requester() {
        let search = StaticSearch::found(results(10));
        let session = session(search.clone());

        engine(silent())
            .on_queue_empty(&session, Some(&track("spotify", Some("abc123"))))
            .await;

        let (query, requester) = search.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(
            query,
            SearchQuery::new(
                "seed_tracks=abc123&limit=20&min_popularity=30",
                SearchBackend::SpotifyRecommendations
            )
        );
        assert_eq!(requester, Some(UserId::new(99)));
    }

    #[tokio::test]
    async fn test_non_empty_queue_is_left_alone() {
        let search = StaticSearch::found(results(10));
        let session = session(search.clone());
        session.append(track("youtube", Some("queued"))).unwrap();

        let outcome = engine(silent())
            .on_queue_empty(&session, Some(&track("youtube", Some("seed"))))
            .await;

        assert_eq!(outcome, PassOutcome::QueueNotEmpty);
        assert_eq!(session.len(), 1);
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_last_track_is_a_no_op() {
        let search = StaticSearch::found(results(10));
        let session = session(search.clone());

        let outcome = engine(silent()).on_queue_empty(&session, None).await;

        assert_eq!(outcome, PassOutcome::NoSeed);
        assert!(session.is_active());
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connection_failure_counts_as_no_results() {
        let session = session(StaticSearch::failing());

        let outcome = engine(expecting(NO_RESULTS_MESSAGE))
            .on_queue_empty(&session, Some(&track("soundcloud", Some("seed"))))
            .await;

        assert_eq!(outcome, PassOutcome::NoResults);
        assert_eq!(session.state(), SessionState::Destroyed);
    }

    #[tokio::test]
    async fn test_nothing_to_search_destroys_without_request() {
        let search = StaticSearch::found(results(10));
        let session = session(search.clone());
        let mut seed = track("soundcloud", None);
        seed.author.clear();
        seed.title.clear();

        let outcome = engine(expecting(NO_RESULTS_MESSAGE))
            .on_queue_empty(&session, Some(&seed))
            .await;

        assert_eq!(outcome, PassOutcome::NoResults);
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_destroyed_session_is_ignored() {
        let search = StaticSearch::found(results(10));
        let session = session(search.clone());
        session.destroy();

        let outcome = engine(silent())
            .on_queue_empty(&session, Some(&track("youtube", Some("seed"))))
            .await;

        assert_eq!(outcome, PassOutcome::SessionInactive);
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_partial_unique_results_leave_queue_untouched() {
        // Two usable results out of five is not enough for a batch.
        let mut candidates = results(5);
        let search = StaticSearch::found(candidates.clone());
        let session = session(search);
        for played in candidates.drain(..3) {
            session.mark_played(played);
        }

        let outcome = engine(expecting(NO_UNIQUE_TRACK_MESSAGE))
            .on_queue_empty(&session, Some(&track("youtube", Some("seed"))))
            .await;

        assert_eq!(outcome, PassOutcome::AllDuplicates);
        assert!(session.is_empty());
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_failure_notice_goes_to_session_channel() {
        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .with(eq(ChannelId::new(2)), always(), always())
            .times(1)
            .return_const(());
        let session = session(StaticSearch::found(vec![]));

        engine(notifier)
            .on_queue_empty(&session, Some(&track("youtube", None)))
            .await;

        assert!(!session.is_active());
    }
}
