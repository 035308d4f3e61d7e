use crate::config::RelayConfig;
use crate::{Error, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPoolSnapshot {
    pub servers: Vec<String>,
    /// Index used by the most recent connect, if any.
    pub cursor: Option<usize>,
    pub user_counts: Vec<u64>,
}

#[derive(Debug)]
struct State {
    cursor: Option<usize>,
    user_counts: Vec<u64>,
}

/// Relay servers plus the last user count seen on each.
///
/// - Implicit selection rotates through the list, so two consecutive connects never use
///   the same server (for pools with more than one server)
/// - Explicit selection moves the cursor to the chosen server
/// - Cursor and counts live behind one mutex; share the pool with `Arc<ServerPool>`
pub struct ServerPool {
    scheme: String,
    host: String,
    servers: Vec<String>,
    state: Mutex<State>,
}

impl ServerPool {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        servers: Vec<String>,
    ) -> Result<Self> {
        if servers.is_empty() {
            return Err(Error::configuration_with_context(
                "server pool needs at least one server",
                crate::ErrorContext::new()
                    .with_field_path("servers")
                    .with_source("server_pool"),
            ));
        }
        let len = servers.len();
        Ok(Self {
            scheme: scheme.into(),
            host: host.into(),
            servers,
            state: Mutex::new(State {
                cursor: None,
                user_counts: vec![0; len],
            }),
        })
    }

    pub fn from_config(cfg: &RelayConfig) -> Result<Self> {
        Self::new(cfg.scheme.clone(), cfg.host.clone(), cfg.servers.clone())
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Counts and cursor stay meaningful even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn server_name(&self, index: usize) -> Option<&str> {
        self.servers.get(index).map(String::as_str)
    }

    /// Claim a server for a new connection.
    ///
    /// `None` advances the rotating cursor; `Some(i)` validates `i` and moves the cursor
    /// there. Both happen atomically with respect to other sessions sharing the pool.
    pub fn select(&self, requested: Option<usize>) -> Result<usize> {
        let mut st = self.state();
        let index = match requested {
            Some(i) if i >= self.servers.len() => {
                return Err(Error::ServerIndexOutOfRange {
                    index: i,
                    len: self.servers.len(),
                })
            }
            Some(i) => i,
            None => st.cursor.map(|c| (c + 1) % self.servers.len()).unwrap_or(0),
        };
        st.cursor = Some(index);
        Ok(index)
    }

    /// Index the next implicit [`select`](Self::select) would return, without claiming it.
    pub fn peek_next(&self) -> usize {
        self.state()
            .cursor
            .map(|c| (c + 1) % self.servers.len())
            .unwrap_or(0)
    }

    /// Last recorded user count for `index`; `0` if never observed or out of range.
    pub fn user_count(&self, index: usize) -> u64 {
        self.state().user_counts.get(index).copied().unwrap_or(0)
    }

    pub fn record_user_count(&self, index: usize, count: u64) {
        if let Some(slot) = self.state().user_counts.get_mut(index) {
            *slot = count;
        }
    }

    /// `{scheme}://{server}.{host}/{action}`, or `{scheme}://{host}/{action}` for the
    /// unnamed server.
    pub fn url(&self, index: usize, action: &str) -> String {
        let server = self.server_name(index).unwrap_or("");
        let dot = if server.is_empty() { "" } else { "." };
        format!("{}://{}{}{}/{}", self.scheme, server, dot, self.host, action)
    }

    pub fn snapshot(&self) -> ServerPoolSnapshot {
        let st = self.state();
        ServerPoolSnapshot {
            servers: self.servers.clone(),
            cursor: st.cursor,
            user_counts: st.user_counts.clone(),
        }
    }
}

impl std::fmt::Debug for ServerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerPool")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("servers", &self.servers)
            .finish()
    }
}
