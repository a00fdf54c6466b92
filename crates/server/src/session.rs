//! Per-connection stream session.
//!
//! Each `/stream` connection runs one instance of the state machine below:
//! backlog snapshot first, then a live loop that waits for change
//! notifications with a heartbeat-bounded timeout. All log reads happen in
//! single critical sections inside [`MessageLog`]; emission happens outside
//! the lock, so a slow peer stalls only its own session.

use std::{sync::Arc, time::Duration};

use async_stream::stream;
use futures::stream::Stream;
use tokio::{
    sync::broadcast::error::RecvError,
    time::{timeout, Instant},
};
use tracing::debug;

use crate::{store::MessageLog, types::Message};

/// Default quiet period between heartbeats.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// What a session emits to its peer, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A relayed message, ascending id order
    Message(Message),
    /// History was wiped; emitted before any post-clear message
    Clear,
    /// Periodic no-op keeping intermediaries from dropping the connection
    Heartbeat,
}

/// Open a session over the shared log, resuming after `resume_from`.
///
/// The stream never ends on its own; it is dropped when the peer
/// disconnects. `resume_from` is the last id the client has already seen
/// (0 for the full backlog). A clear observed mid-stream does not rewind
/// the cursor: ids are never reused, so post-clear messages always sort
/// after everything already emitted.
pub fn event_stream(
    store: Arc<MessageLog>,
    resume_from: u64,
    heartbeat: Duration,
) -> impl Stream<Item = SessionEvent> {
    stream! {
        // Subscribe before the backlog snapshot: an append racing the
        // snapshot is either included in it or queued on the receiver.
        let mut rx = store.subscribe();

        let mut last_seen_id = resume_from;
        let backlog = store.backlog(last_seen_id);
        let mut known_epoch = backlog.epoch;

        debug!(resume_from, backlog = backlog.messages.len(), "Session opened");

        for msg in backlog.messages {
            last_seen_id = msg.id;
            yield SessionEvent::Message(msg);
        }

        let mut next_heartbeat = Instant::now() + heartbeat;

        loop {
            let wait = next_heartbeat.saturating_duration_since(Instant::now());
            let notified = match timeout(wait, rx.recv()).await {
                Ok(Ok(_)) => true,
                // Falling behind the channel still means the log changed;
                // the poll below re-derives everything from the log itself.
                Ok(Err(RecvError::Lagged(_))) => true,
                Ok(Err(RecvError::Closed)) => break,
                Err(_) => false,
            };

            let poll = store.poll(last_seen_id, known_epoch, notified);

            if poll.cleared {
                known_epoch = poll.epoch;
                yield SessionEvent::Clear;
            }

            for msg in poll.pending {
                last_seen_id = msg.id;
                yield SessionEvent::Message(msg);
            }

            if Instant::now() >= next_heartbeat {
                yield SessionEvent::Heartbeat;
                next_heartbeat = Instant::now() + heartbeat;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{pin_mut, StreamExt};

    use super::*;
    use crate::types::Role;

    const TEST_HEARTBEAT: Duration = Duration::from_millis(200);

    fn append(log: &MessageLog, content: &str) -> Message {
        log.append(Role::User, content.to_string(), String::new())
    }

    async fn next_event(
        stream: &mut (impl Stream<Item = SessionEvent> + Unpin),
    ) -> SessionEvent {
        timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("session stalled")
            .expect("session ended")
    }

    #[tokio::test(start_paused = true)]
    async fn test_backlog_then_live_tail() {
        let log = MessageLog::new(10);
        append(&log, "one");
        append(&log, "two");

        let stream = event_stream(log.clone(), 0, TEST_HEARTBEAT);
        pin_mut!(stream);

        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 1));
        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 2));

        append(&log, "three");
        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_skips_already_seen() {
        let log = MessageLog::new(10);
        append(&log, "one");
        append(&log, "two");
        append(&log, "three");

        let stream = event_stream(log.clone(), 2, TEST_HEARTBEAT);
        pin_mut!(stream);

        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_emitted_before_post_clear_messages() {
        let log = MessageLog::new(10);
        append(&log, "before");

        let stream = event_stream(log.clone(), 0, TEST_HEARTBEAT);
        pin_mut!(stream);

        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 1));

        log.clear();
        append(&log, "after");

        assert_eq!(next_event(&mut stream).await, SessionEvent::Clear);
        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_clears_collapse_into_one() {
        let log = MessageLog::new(10);
        append(&log, "seed");

        let stream = event_stream(log.clone(), 0, TEST_HEARTBEAT);
        pin_mut!(stream);

        // Drive the session past its entry snapshot before clearing.
        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 1));

        log.clear();
        log.clear();
        log.clear();
        append(&log, "after");

        assert_eq!(next_event(&mut stream).await, SessionEvent::Clear);
        match next_event(&mut stream).await {
            SessionEvent::Message(m) => assert_eq!(m.id, 2),
            other => panic!("expected message after single clear, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cursor_not_rewound_by_clear() {
        let log = MessageLog::new(10);

        let stream = event_stream(log.clone(), 0, TEST_HEARTBEAT);
        pin_mut!(stream);

        append(&log, "first");
        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 1));

        log.clear();
        assert_eq!(next_event(&mut stream).await, SessionEvent::Clear);

        // Post-clear append carries a higher id; the session never re-emits
        // id 1 even though its cursor predates the wipe.
        append(&log, "second");
        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_heartbeats() {
        let log = MessageLog::new(10);

        let stream = event_stream(log.clone(), 0, TEST_HEARTBEAT);
        pin_mut!(stream);

        assert_eq!(next_event(&mut stream).await, SessionEvent::Heartbeat);
        assert_eq!(next_event(&mut stream).await, SessionEvent::Heartbeat);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_connected_during_activity() {
        let log = MessageLog::new(10);
        append(&log, "old");
        log.clear();

        // Connecting after a clear: the epoch snapshot at entry already
        // reflects it, so no spurious clear event is emitted.
        let stream = event_stream(log.clone(), 0, TEST_HEARTBEAT);
        pin_mut!(stream);

        append(&log, "new");
        assert!(matches!(next_event(&mut stream).await, SessionEvent::Message(m) if m.id == 2));
    }
}
