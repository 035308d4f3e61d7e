//! Event polling loop.
//!
//! One loop per successful connect. Each loop is tied to the epoch of the connect that
//! spawned it and stops as soon as that epoch is no longer current, so a loop left over
//! from an earlier session never touches the state of a newer one.

use crate::relay::{action, EventDecoder, RelayEvent};
use crate::session::client::SessionClient;
use crate::session::state::StrangerPresence;
use crate::transport::FormFields;
use crate::types::{Message, SessionEvent};
use std::time::Instant;
use tracing::{debug, info_span, trace, warn, Instrument};

/// Outcome of one poll cycle.
enum Cycle {
    /// Events were dispatched; poll again immediately.
    Dispatched,
    /// Nothing to do this cycle; sleep before polling again.
    Idle,
    Stop,
}

impl SessionClient {
    pub(crate) fn spawn_poll_loop(&self, epoch: u64) {
        let client = self.clone();
        let span = info_span!(
            "relay_poll",
            epoch,
            session_id = client.session_id().unwrap_or_default().as_str()
        );
        tokio::spawn(async move { client.poll_loop(epoch).await }.instrument(span));
    }

    async fn poll_loop(self, epoch: u64) {
        debug!("poll loop started");
        loop {
            match self.poll_once(epoch).await {
                Cycle::Dispatched => {}
                Cycle::Idle => tokio::time::sleep(self.inner.poll_interval).await,
                Cycle::Stop => break,
            }
        }
        debug!("poll loop stopped");
    }

    async fn poll_once(&self, epoch: u64) -> Cycle {
        let (index, session_id) = {
            let st = self.inner.state();
            if !st.is_current(epoch) {
                return Cycle::Stop;
            }
            (
                st.server_index.unwrap_or(0),
                st.session_id.clone().unwrap_or_default(),
            )
        };

        let url = self.inner.pool.url(index, action::EVENTS);
        let form = FormFields::new().with("id", session_id);
        let started = Instant::now();
        let result = self.inner.transport.post(&url, &form).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                self.inner.poll_failed(epoch, &e);
                return Cycle::Stop;
            }
        };

        // A disconnect or reconnect may have happened while the request was in flight.
        if !self.inner.state().is_current(epoch) {
            trace!("discarding poll result of a stale session");
            return Cycle::Stop;
        }

        let events = match EventDecoder::decode(&body) {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "undecodable poll body, treating as empty");
                Vec::new()
            }
        };
        if events.is_empty() {
            return Cycle::Idle;
        }

        for event in events {
            // Records after a disconnect belong to a session that no longer exists.
            if !self.inner.state().is_current(epoch) {
                trace!("session ended mid-batch, dropping remaining records");
                return Cycle::Stop;
            }
            self.dispatch(index, event, elapsed_ms).await;
        }
        Cycle::Dispatched
    }

    async fn dispatch(&self, index: usize, event: RelayEvent, elapsed_ms: u64) {
        match event {
            RelayEvent::Connected => {
                self.inner.set_stranger(StrangerPresence::Present);
                self.inner.emit(SessionEvent::StrangerConnected);
            }
            RelayEvent::StrangerDisconnected => {
                self.inner.set_stranger(StrangerPresence::Absent);
                self.inner.emit(SessionEvent::StrangerDisconnected);
                if let Err(e) = self.disconnect().await {
                    debug!(error = %e, "disconnect after stranger left failed");
                }
            }
            RelayEvent::MessageReceived(text) => {
                self.inner
                    .emit(SessionEvent::MessageReceived(Message::new(text, elapsed_ms)));
            }
            RelayEvent::Waiting => {
                self.inner.set_stranger(StrangerPresence::Absent);
                self.inner.emit(SessionEvent::Waiting);
            }
            RelayEvent::Typing => self.inner.emit(SessionEvent::StrangerTyping),
            RelayEvent::StoppedTyping => self.inner.emit(SessionEvent::StrangerStoppedTyping),
            RelayEvent::UserCount(count) => {
                match count {
                    Some(count) => self.inner.pool.record_user_count(index, count),
                    None => debug!("user count is not an integer, keeping the stored one"),
                }
                self.inner.emit(SessionEvent::UserCountUpdated {
                    server_index: index,
                    count: self.inner.pool.user_count(index),
                });
            }
            RelayEvent::CaptchaRequired(challenge_id) => {
                self.inner
                    .emit(SessionEvent::CaptchaRequired { challenge_id });
            }
            RelayEvent::CaptchaRejected => self.inner.emit(SessionEvent::CaptchaRejected),
            RelayEvent::Unhandled(record) => {
                debug!(record = %record, "unhandled relay event");
                self.inner.emit(SessionEvent::Unhandled { record });
            }
        }
    }
}
