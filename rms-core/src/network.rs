//! Network availability signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

/// Synchronous "is the host online" query used as a connect precondition.
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}

impl<T: NetworkStatus + ?Sized> NetworkStatus for Arc<T> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }
}

/// Online flag toggled by the host environment.
///
/// Starts online; clones share the same flag.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    online: Arc<AtomicBool>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    /// Record a change in host connectivity.
    pub fn set_online(&self, online: bool) {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!("network {}", if online { "online" } else { "offline" });
        }
    }
}

impl NetworkStatus for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
