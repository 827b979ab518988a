//! Account session
//!
//! The session provider owns wallet connection state; the pipeline only reads
//! a snapshot of it at the start of each operation.

use parking_lot::RwLock;

/// Snapshot of the connection state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub connected: bool,
    pub address: Option<String>,
}

impl Session {
    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            connected: true,
            address: Some(address.into()),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Address of a connected account, `None` when disconnected
    pub fn account(&self) -> Option<&str> {
        if self.connected {
            self.address.as_deref()
        } else {
            None
        }
    }
}

/// Source of connection state
pub trait SessionProvider: Send + Sync {
    fn session(&self) -> Session;
}

/// Session held in memory and switched by the embedding application
#[derive(Debug, Default)]
pub struct SharedSession {
    inner: RwLock<Session>,
}

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self {
            inner: RwLock::new(session),
        }
    }

    pub fn connect(&self, address: impl Into<String>) {
        *self.inner.write() = Session::connected(address);
    }

    pub fn disconnect(&self) {
        *self.inner.write() = Session::disconnected();
    }
}

impl SessionProvider for SharedSession {
    fn session(&self) -> Session {
        self.inner.read().clone()
    }
}
