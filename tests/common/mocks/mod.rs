//! Doubles for the collaborators the continuation engine talks to.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use encore::music::{ConnectionError, Notifier, SearchQuery, Track, TrackSearch};
use mockall::mock;
use poise::serenity_prelude::{ChannelId, UserId};
use serenity::async_trait;

mock! {
    pub Sink {}

    #[async_trait]
    impl Notifier for Sink {
        async fn notify(&self, channel: ChannelId, message: &str, auto_delete: Option<Duration>);
    }
}

/// A sink that must never be called.
pub fn silent_sink() -> MockSink {
    let mut sink = MockSink::new();
    sink.expect_notify().never();
    sink
}

/// A sink expecting exactly one notice with `message` in `channel`.
pub fn expect_notice(channel: ChannelId, message: &'static str) -> MockSink {
    let mut sink = MockSink::new();
    sink.expect_notify()
        .withf(move |target, text, auto_delete| {
            *target == channel && text == message && auto_delete.is_some()
        })
        .times(1)
        .return_const(());
    sink
}

/// Node search double answering every query the same way, optionally slowly.
pub struct ScriptedSearch {
    answer: Result<Vec<Track>, ()>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(SearchQuery, Option<UserId>)>>,
}

impl ScriptedSearch {
    pub fn returning(tracks: Vec<Track>) -> Self {
        Self {
            answer: Ok(tracks),
            delay: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err(()),
            ..Self::returning(Vec::new())
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(SearchQuery, Option<UserId>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrackSearch for ScriptedSearch {
    async fn search(
        &self,
        query: &SearchQuery,
        requester: Option<UserId>,
    ) -> Result<Vec<Track>, ConnectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push((query.clone(), requester));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.answer
            .clone()
            .map(|tracks| tracks.into_iter().map(|t| t.with_requester(requester)).collect())
            .map_err(|_| ConnectionError::NoNodes)
    }
}
