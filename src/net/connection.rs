//! Connection identity.
//!
//! Every accepted WebSocket client gets a `ConnectionId`; the session
//! registry keys upstream handles by it and every session log line carries it.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of one WebSocket client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(NonZeroU64);

impl ConnectionId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let n = NEXT_SESSION.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and would need 2^64 clients to wrap.
        Self(NonZeroU64::new(n).unwrap_or(NonZeroU64::MIN))
    }
}

impl From<ConnectionId> for u64 {
    fn from(id: ConnectionId) -> Self {
        id.0.get()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ws-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase() {
        let first = ConnectionId::new();
        let second = ConnectionId::new();
        assert!(second > first);
        assert!(u64::from(first) >= 1);
    }

    #[test]
    fn displays_with_prefix() {
        let id = ConnectionId::new();
        assert_eq!(id.to_string(), format!("ws-{}", u64::from(id)));
    }
}
