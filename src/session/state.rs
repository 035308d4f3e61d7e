use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrangerPresence {
    #[default]
    Absent,
    Present,
}

/// Observable state of one relay session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Id issued by the relay on the last successful connect. Kept after disconnect.
    pub session_id: Option<String>,
    pub status: ConnectionStatus,
    pub stranger: StrangerPresence,
    pub server_index: Option<usize>,
    /// Bumped on every connect; a poll loop only acts while its epoch is current.
    #[serde(skip)]
    pub(crate) epoch: u64,
}

impl SessionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn is_stranger_connected(&self) -> bool {
        self.stranger == StrangerPresence::Present
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.is_connected() && self.epoch == epoch
    }

    /// Drop back to disconnected/absent; returns whether the session was connected.
    pub(crate) fn reset(&mut self) -> bool {
        let was_connected = self.is_connected();
        self.status = ConnectionStatus::Disconnected;
        self.stranger = StrangerPresence::Absent;
        was_connected
    }
}
