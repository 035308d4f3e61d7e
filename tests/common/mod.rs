//! Scripted relay used by the session integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use relay_chat::{FormFields, ServerPool, SessionClient, SessionEvent, Transport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

pub const SESSION_ID: &str = "central1:4fk2x9";

#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Fail,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub action: String,
    pub form: FormFields,
    pub at: Instant,
}

/// In-memory relay: answers each action from its own queue, falling back to a fixed
/// default once the queue is empty, and records every request.
pub struct ScriptedRelay {
    queues: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            queues: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, action: &str, body: &str) {
        self.push_reply(action, Reply::Body(body.to_string()));
    }

    pub fn push_failure(&self, action: &str) {
        self.push_reply(action, Reply::Fail);
    }

    fn push_reply(&self, action: &str, reply: Reply) {
        self.queues
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, action: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.action == action)
            .collect()
    }

    fn default_body(action: &str) -> &'static str {
        match action {
            "start" => "\"central1:4fk2x9\"",
            "events" => "null",
            _ => "win",
        }
    }
}

#[async_trait]
impl Transport for ScriptedRelay {
    async fn post(&self, url: &str, form: &FormFields) -> Result<String, TransportError> {
        let action = url.rsplit('/').next().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            action: action.clone(),
            form: form.clone(),
            at: Instant::now(),
        });

        let scripted = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&action)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Fail) => Err(TransportError::Other("connection reset".into())),
            None => Ok(Self::default_body(&action).to_string()),
        }
    }
}

/// Pool of `servers` entries on `relay.test`; index 0 is the unnamed server.
pub fn pool(servers: usize) -> Arc<ServerPool> {
    let names = (0..servers)
        .map(|i| if i == 0 { String::new() } else { format!("s{}", i) })
        .collect();
    Arc::new(ServerPool::new("http", "relay.test", names).unwrap())
}

pub fn client(relay: &Arc<ScriptedRelay>, servers: usize, poll_interval: Duration) -> SessionClient {
    SessionClient::builder()
        .transport(relay.clone())
        .pool(pool(servers))
        .poll_interval(poll_interval)
        .build()
        .unwrap()
}

/// Next event, failing the test if none arrives within two seconds.
pub async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("session event channel closed")
}

/// Poll `cond` every few milliseconds for up to two seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
