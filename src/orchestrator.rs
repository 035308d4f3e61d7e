//! Session ↔ responder glue.
//!
//! The [`Orchestrator`] listens to a [`SessionClient`] and a [`Responder`] at the same time:
//!
//! - `MessageReceived`: hand the message to the responder if it is idle
//! - `Started`: show the typing indicator
//! - `Finished`: wait out the rest of the human typing time, clear the indicator and send
//!   the reply
//!
//! Reply delivery runs on its own task so the loop keeps draining session events while a
//! reply is being "typed".

use crate::responder::Responder;
use crate::session::SessionClient;
use crate::types::{Message, ProcessingEvent, SessionEvent};
use crate::{typing, Error};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type RewriteFn = dyn Fn(&str) -> String + Send + Sync;

pub struct OrchestratorBuilder {
    session: SessionClient,
    responder: Arc<dyn Responder>,
    rewrite: Option<Arc<RewriteFn>>,
    reconnect_delay: Option<Duration>,
}

impl OrchestratorBuilder {
    pub fn new(session: SessionClient, responder: Arc<dyn Responder>) -> Self {
        Self {
            session,
            responder,
            rewrite: None,
            reconnect_delay: None,
        }
    }

    /// Transform every reply before it is sent.
    pub fn rewrite_reply<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.rewrite = Some(Arc::new(f));
        self
    }

    /// Connect again (next server in rotation) `delay` after every `Disconnected`.
    pub fn auto_reconnect(mut self, delay: Duration) -> Self {
        self.reconnect_delay = Some(delay);
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            session: self.session,
            responder: self.responder,
            rewrite: self.rewrite,
            reconnect_delay: self.reconnect_delay,
        }
    }
}

pub struct Orchestrator {
    session: SessionClient,
    responder: Arc<dyn Responder>,
    rewrite: Option<Arc<RewriteFn>>,
    reconnect_delay: Option<Duration>,
}

impl Orchestrator {
    pub fn builder(session: SessionClient, responder: Arc<dyn Responder>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(session, responder)
    }

    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    /// Run until the task is aborted.
    pub async fn run(self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run until `shutdown` completes or a notification channel closes.
    ///
    /// Subscribes on entry, so events emitted before the call are not seen.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut session_events = self.session.subscribe();
        let mut processing_events = self.responder.subscribe();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                event = session_events.recv() => match event {
                    Ok(event) => self.on_session_event(event),
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "orchestrator lagging behind session events"),
                    Err(RecvError::Closed) => break,
                },
                event = processing_events.recv() => match event {
                    Ok(event) => self.on_processing_event(event),
                    Err(RecvError::Lagged(n)) => warn!(skipped = n, "orchestrator lagging behind responder events"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("orchestrator stopped");
    }

    /// Run on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn on_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::MessageReceived(message) => {
                if self.responder.is_processing() {
                    debug!("responder busy, message not answered");
                    return;
                }
                match self.responder.process_async(message) {
                    Ok(()) => {}
                    Err(Error::Busy) => debug!("responder busy, message not answered"),
                    Err(e) => warn!(error = %e, "could not start responder"),
                }
            }
            SessionEvent::Disconnected => {
                if let Some(delay) = self.reconnect_delay {
                    let session = self.session.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if session.is_connected() {
                            return;
                        }
                        info!("reconnecting");
                        if let Err(e) = session.connect(None).await {
                            warn!(error = %e, "automatic reconnect failed");
                        }
                    });
                }
            }
            _ => {}
        }
    }

    fn on_processing_event(&self, event: ProcessingEvent) {
        let session = self.session.clone();
        match event {
            ProcessingEvent::Started(_) => {
                tokio::spawn(async move {
                    if let Err(e) = session.send_typing().await {
                        warn!(error = %e, "typing indicator failed");
                    }
                });
            }
            ProcessingEvent::Finished(reply) => {
                let reply = match &self.rewrite {
                    Some(f) => Message::new(f(&reply.text), reply.latency_ms),
                    None => reply,
                };
                tokio::spawn(deliver(session, reply));
            }
            ProcessingEvent::Failed { error, .. } => {
                warn!(error = error.as_str(), "responder failed, no reply sent");
                tokio::spawn(async move {
                    if let Err(e) = session.send_typing_stopped().await {
                        debug!(error = %e, "clearing typing indicator failed");
                    }
                });
            }
        }
    }
}

/// Pace a reply like a human typist, then send it.
///
/// Time already spent producing the reply counts toward the typing time.
async fn deliver(session: SessionClient, reply: Message) {
    if !session.is_connected() || !session.is_stranger_connected() {
        debug!("stranger gone, reply dropped");
        return;
    }
    let estimate_ms = typing::estimate_ms(&reply.text);
    let remaining = estimate_ms.saturating_sub(reply.latency_ms);
    if remaining > 0 {
        tokio::time::sleep(Duration::from_millis(remaining)).await;
    }

    if let Err(e) = session.send_typing_stopped().await {
        warn!(error = %e, "clearing typing indicator failed");
        return;
    }
    if let Err(e) = session
        .send_message(&reply.text, reply.latency_ms.max(estimate_ms))
        .await
    {
        warn!(error = %e, "sending reply failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::ServerPool;
    use crate::transport::{FormFields, Transport, TransportError};
    use crate::{Backend, Chatbot};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Relay double: answers polls from a script, then with silence.
    #[derive(Default)]
    struct FakeRelay {
        polls: Mutex<VecDeque<String>>,
        sent: Mutex<Vec<(String, FormFields)>>,
    }

    impl FakeRelay {
        fn scripted(polls: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                polls: Mutex::new(polls.iter().map(|p| p.to_string()).collect()),
                ..Default::default()
            })
        }

        fn urls(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }

        /// Every action except `events`, in request order.
        fn actions(&self) -> Vec<String> {
            self.urls()
                .iter()
                .map(|url| url.rsplit('/').next().unwrap_or_default().to_string())
                .filter(|a| a != "events")
                .collect()
        }
    }

    #[async_trait]
    impl Transport for FakeRelay {
        async fn post(&self, url: &str, form: &FormFields) -> Result<String, TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push((url.to_string(), form.clone()));
            if url.ends_with("/start") {
                return Ok("\"central1:abc\"".into());
            }
            if url.ends_with("/events") {
                let next = self.polls.lock().unwrap().pop_front();
                return Ok(next.unwrap_or_else(|| "null".into()));
            }
            Ok("win".into())
        }
    }

    fn session_on(relay: &Arc<FakeRelay>, servers: &[&str]) -> SessionClient {
        let names = servers.iter().map(|s| s.to_string()).collect();
        let pool = Arc::new(ServerPool::new("http", "relay.test", names).unwrap());
        SessionClient::builder()
            .transport(relay.clone())
            .pool(pool)
            .poll_interval(Duration::from_millis(10))
            .build()
            .unwrap()
    }

    async fn wait_for(cond: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    struct Shout;

    #[async_trait]
    impl Backend for Shout {
        async fn exchange(&mut self, input: &Message) -> crate::Result<String> {
            Ok(format!("{} Bot", input.text.to_uppercase()))
        }
    }

    /// Counts calls and holds each one until released.
    struct Gate {
        calls: Arc<AtomicUsize>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Backend for Gate {
        async fn exchange(&mut self, input: &Message) -> crate::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(input.text.to_uppercase())
        }
    }

    struct Unavailable;

    #[async_trait]
    impl Backend for Unavailable {
        async fn exchange(&mut self, _input: &Message) -> crate::Result<String> {
            Err(Error::runtime("service unavailable"))
        }
    }

    #[tokio::test]
    async fn test_reply_is_typed_and_sent() {
        let relay = FakeRelay::scripted(&[r#"[["connected"],["gotMessage","hello"]]"#]);
        let session = session_on(&relay, &[""]);
        let bot: Arc<dyn Responder> = Arc::new(Chatbot::new(Shout));

        let orchestrator = Orchestrator::builder(session.clone(), bot)
            .rewrite_reply(|text| text.replace("Bot", "Alice"))
            .build();
        let mut events = session.subscribe();
        let handle = orchestrator.spawn();
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.connect(None).await.unwrap();

        let sent = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(SessionEvent::MessageSent(m)) = events.recv().await {
                    return m;
                }
            }
        })
        .await
        .unwrap();
        handle.abort();

        assert_eq!(sent.text, "HELLO Alice");
        assert!(sent.latency_ms >= typing::estimate_ms("HELLO Alice"));
        assert_eq!(relay.actions(), ["start", "typing", "stoppedtyping", "send"]);
    }

    #[tokio::test]
    async fn test_auto_reconnect_moves_to_next_server() {
        let relay = FakeRelay::scripted(&[r#"[["connected"],["strangerDisconnected"]]"#]);
        let session = session_on(&relay, &["", "s1"]);
        let bot: Arc<dyn Responder> = Arc::new(Chatbot::new(Shout));

        let handle = Orchestrator::builder(session.clone(), bot)
            .auto_reconnect(Duration::from_millis(20))
            .build()
            .spawn();
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.connect(None).await.unwrap();
        wait_for(|| relay.actions().iter().filter(|a| *a == "start").count() == 2).await;
        wait_for(|| session.is_connected()).await;
        handle.abort();

        let starts: Vec<String> = relay
            .urls()
            .into_iter()
            .filter(|url| url.ends_with("/start"))
            .collect();
        assert_eq!(starts, ["http://relay.test/start", "http://s1.relay.test/start"]);
        assert_eq!(session.server_index(), Some(1));
    }

    #[tokio::test]
    async fn test_auto_reconnect_skipped_when_already_connected() {
        let relay = FakeRelay::scripted(&[]);
        let session = session_on(&relay, &["", "s1"]);
        let bot: Arc<dyn Responder> = Arc::new(Chatbot::new(Shout));

        let handle = Orchestrator::builder(session.clone(), bot)
            .auto_reconnect(Duration::from_millis(100))
            .build()
            .spawn();
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.connect(None).await.unwrap();
        session.disconnect().await.unwrap();
        session.connect(Some(0)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.abort();

        assert_eq!(relay.actions(), ["start", "disconnect", "start"]);
        assert_eq!(session.server_index(), Some(0));
    }

    #[tokio::test]
    async fn test_message_while_busy_is_dropped() {
        let relay = FakeRelay::scripted(&[
            r#"[["connected"],["gotMessage","first"],["gotMessage","second"]]"#,
        ]);
        let session = session_on(&relay, &[""]);
        let calls = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());
        let bot: Arc<dyn Responder> = Arc::new(Chatbot::new(Gate {
            calls: Arc::clone(&calls),
            release: Arc::clone(&release),
        }));

        let mut events = session.subscribe();
        let handle = Orchestrator::builder(session.clone(), bot).build().spawn();
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.connect(None).await.unwrap();
        wait_for(|| calls.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        release.notify_one();
        let sent = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Ok(SessionEvent::MessageSent(m)) = events.recv().await {
                    return m;
                }
            }
        })
        .await
        .unwrap();
        handle.abort();

        assert_eq!(sent.text, "FIRST");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(relay.actions().iter().filter(|a| *a == "send").count(), 1);
    }

    #[tokio::test]
    async fn test_failed_reply_clears_typing_without_sending() {
        let relay = FakeRelay::scripted(&[r#"[["connected"],["gotMessage","hi"]]"#]);
        let session = session_on(&relay, &[""]);
        let bot: Arc<dyn Responder> = Arc::new(Chatbot::new(Unavailable));

        let handle = Orchestrator::builder(session.clone(), bot).build().spawn();
        tokio::time::sleep(Duration::from_millis(10)).await;

        session.connect(None).await.unwrap();
        wait_for(|| relay.actions().iter().any(|a| a == "stoppedtyping")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        let actions = relay.actions();
        assert!(actions.iter().any(|a| a == "typing"));
        assert!(!actions.iter().any(|a| a == "send"));
        assert!(session.is_stranger_connected());
    }
}
