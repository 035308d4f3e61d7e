use crate::relay::{action, ServerPool};
use crate::session::builder::SessionClientBuilder;
use crate::session::state::{ConnectionStatus, SessionState, StrangerPresence};
use crate::transport::{FormFields, Transport, TransportError};
use crate::types::{Message, SessionEvent};
use crate::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub(crate) struct Inner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) pool: Arc<ServerPool>,
    pub(crate) poll_interval: Duration,
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

/// Client for one relay session at a time.
///
/// Cloning is cheap and every clone drives the same session. Notifications are published
/// to every receiver obtained from [`subscribe`](Self::subscribe); subscribe before
/// calling [`connect`](Self::connect) to see the `Connected` event.
#[derive(Clone)]
pub struct SessionClient {
    pub(crate) inner: Arc<Inner>,
}

impl SessionClient {
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::new()
    }

    /// Client with the default poll interval and notification buffer.
    pub fn new(transport: Arc<dyn Transport>, pool: Arc<ServerPool>) -> Self {
        Self::from_parts(
            transport,
            pool,
            Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
            crate::session::builder::DEFAULT_EVENT_CAPACITY,
        )
    }

    pub(crate) fn from_parts(
        transport: Arc<dyn Transport>,
        pool: Arc<ServerPool>,
        poll_interval: Duration,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity);
        Self {
            inner: Arc::new(Inner {
                transport,
                pool,
                poll_interval,
                state: Mutex::new(SessionState::default()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.inner.pool
    }

    pub fn state(&self) -> SessionState {
        self.inner.state().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state().is_connected()
    }

    pub fn is_stranger_connected(&self) -> bool {
        self.inner.state().is_stranger_connected()
    }

    pub fn session_id(&self) -> Option<String> {
        self.inner.state().session_id.clone()
    }

    pub fn server_index(&self) -> Option<usize> {
        self.inner.state().server_index
    }

    /// Last user count recorded for `server_index`; `0` if never observed.
    ///
    /// Only the server of the active session is refreshed, so counts of other servers
    /// may be stale.
    pub fn user_count(&self, server_index: usize) -> u64 {
        self.inner.pool.user_count(server_index)
    }

    /// User count of the server used by the current (or last) session.
    pub fn current_user_count(&self) -> u64 {
        self.server_index()
            .map(|i| self.inner.pool.user_count(i))
            .unwrap_or(0)
    }

    /// Connect to a relay server and start polling.
    ///
    /// `None` takes the next server from the pool's rotation.
    pub async fn connect(&self, server_index: Option<usize>) -> Result<()> {
        let index = self.inner.pool.select(server_index)?;
        let url = self.inner.pool.url(index, action::START);
        let form = FormFields::new().with("rcs", "1");

        let body = match self.inner.transport.post(&url, &form).await {
            Ok(body) => body,
            Err(e) => return Err(self.inner.transport_failed("connect", e)),
        };
        let session_id = body.trim().trim_matches('"').to_string();

        let epoch = {
            let mut st = self.inner.state();
            if st.is_connected() {
                warn!(
                    previous = st.session_id.as_deref().unwrap_or(""),
                    "connect called on a live session; the previous session is abandoned"
                );
            }
            st.session_id = Some(session_id.clone());
            st.server_index = Some(index);
            st.status = ConnectionStatus::Connected;
            st.stranger = StrangerPresence::Absent;
            st.epoch += 1;
            st.epoch
        };

        info!(
            session_id = session_id.as_str(),
            server_index = index,
            server = self.inner.pool.server_name(index).unwrap_or(""),
            "relay session connected"
        );
        self.inner.emit(SessionEvent::Connected {
            session_id,
            server_index: index,
        });

        self.spawn_poll_loop(epoch);
        Ok(())
    }

    /// End the session.
    ///
    /// The exchange is performed even if the client is already disconnected. State is
    /// reset and `Disconnected` is emitted whether or not the exchange succeeded.
    pub async fn disconnect(&self) -> Result<()> {
        let (index, session_id) = {
            let st = self.inner.state();
            (
                st.server_index.unwrap_or(0),
                st.session_id.clone().unwrap_or_default(),
            )
        };
        let url = self.inner.pool.url(index, action::DISCONNECT);
        let form = FormFields::new().with("id", session_id.as_str());
        let result = self.inner.transport.post(&url, &form).await;

        self.inner.state().reset();
        info!(session_id = session_id.as_str(), "relay session disconnected");
        self.inner.emit(SessionEvent::Disconnected);

        result.map(|_| ()).map_err(|e| {
            warn!(error = %e, "disconnect exchange failed");
            e.into()
        })
    }

    /// Disconnect, then connect again. A failed disconnect exchange does not stop the
    /// new connect.
    pub async fn reconnect(&self, server_index: Option<usize>) -> Result<()> {
        if let Err(e) = self.disconnect().await {
            warn!(error = %e, "continuing reconnect after failed disconnect");
        }
        self.connect(server_index).await
    }

    /// Tell the relay we started typing. No-op unless connected; sent even when no
    /// stranger is present.
    pub async fn send_typing(&self) -> Result<()> {
        self.send_indicator(action::TYPING).await
    }

    /// Tell the relay we stopped typing. Same guards as [`send_typing`](Self::send_typing).
    pub async fn send_typing_stopped(&self) -> Result<()> {
        self.send_indicator(action::STOPPED_TYPING).await
    }

    async fn send_indicator(&self, name: &str) -> Result<()> {
        let Some((index, session_id)) = self.inner.active() else {
            return Ok(());
        };
        let form = FormFields::new().with("id", session_id);
        self.inner.post(index, name, &form).await.map(|_| ())
    }

    /// Send `text` exactly as given. No-op unless connected with a stranger present.
    ///
    /// Emits `RawMessageSent` with latency `extra_latency_ms` plus the exchange time.
    pub async fn send_raw_message(&self, text: &str, extra_latency_ms: u64) -> Result<()> {
        self.send_raw(text, extra_latency_ms).await.map(|_| ())
    }

    /// Returns whether the message went out.
    async fn send_raw(&self, text: &str, extra_latency_ms: u64) -> Result<bool> {
        let Some((index, session_id)) = self.inner.active_with_stranger() else {
            return Ok(false);
        };
        let started = Instant::now();
        let form = FormFields::new()
            .with("id", session_id)
            .with("msg", text);
        self.inner.post(index, action::SEND, &form).await?;
        let latency = extra_latency_ms + started.elapsed().as_millis() as u64;

        self.inner
            .emit(SessionEvent::RawMessageSent(Message::new(text, latency)));
        Ok(true)
    }

    /// URL-encode `text` and send it. No-op unless connected with a stranger present.
    ///
    /// Emits `RawMessageSent` for the encoded text, then `MessageSent` carrying the
    /// original text with latency `extra_latency_ms` plus the time spent sending.
    pub async fn send_message(&self, text: &str, extra_latency_ms: u64) -> Result<()> {
        let started = Instant::now();
        let encoded: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
        if !self.send_raw(&encoded, 0).await? {
            return Ok(());
        }
        let latency = extra_latency_ms + started.elapsed().as_millis() as u64;

        self.inner
            .emit(SessionEvent::MessageSent(Message::new(text, latency)));
        Ok(())
    }

    /// Answer a captcha challenge. Sent regardless of connection state; nothing is
    /// emitted on completion.
    pub async fn send_captcha_response(&self, challenge: &str, response: &str) -> Result<()> {
        let (index, session_id) = {
            let st = self.inner.state();
            (
                st.server_index.unwrap_or(0),
                st.session_id.clone().unwrap_or_default(),
            )
        };
        let form = FormFields::new()
            .with("id", session_id)
            .with("challenge", challenge)
            .with("response", response);
        self.inner
            .post(index, action::RECAPTCHA, &form)
            .await
            .map(|_| ())
    }
}

impl Inner {
    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// Server index and session id while connected.
    fn active(&self) -> Option<(usize, String)> {
        let st = self.state();
        if !st.is_connected() {
            return None;
        }
        Some((st.server_index?, st.session_id.clone()?))
    }

    fn active_with_stranger(&self) -> Option<(usize, String)> {
        if !self.state().is_stranger_connected() {
            return None;
        }
        self.active()
    }

    pub(crate) fn set_stranger(&self, presence: StrangerPresence) {
        self.state().stranger = presence;
    }

    async fn post(&self, index: usize, name: &str, form: &FormFields) -> Result<String> {
        let url = self.pool.url(index, name);
        match self.transport.post(&url, form).await {
            Ok(body) => Ok(body),
            Err(e) => Err(self.transport_failed(name, e)),
        }
    }

    /// Force the session down after a failed exchange. `Disconnected` is emitted only
    /// if the session was up.
    pub(crate) fn transport_failed(&self, exchange: &str, error: TransportError) -> crate::Error {
        let was_connected = self.state().reset();
        warn!(exchange, error = %error, was_connected, "relay exchange failed");
        if was_connected {
            self.emit(SessionEvent::Disconnected);
        }
        error.into()
    }

    /// Like [`transport_failed`](Self::transport_failed) but only for the poll loop of the
    /// current connection.
    pub(crate) fn poll_failed(&self, epoch: u64, error: &TransportError) -> bool {
        let was_current = {
            let mut st = self.state();
            st.is_current(epoch) && st.reset()
        };
        if was_current {
            warn!(error = %error, "poll failed, session closed");
            self.emit(SessionEvent::Disconnected);
        }
        was_current
    }
}
