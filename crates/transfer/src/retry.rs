//! Inter-attempt delays for the upload retry loop.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub type SleeperHandle = Arc<dyn Sleeper>;

/// Suspends the calling task between upload attempts.
///
/// Injected into [`TransferClient`](crate::TransferClient) so that tests can
/// drive the retry loop without waiting out real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the Tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Returns immediately, remembering every delay it was asked for.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(any(test, feature = "mock"))]
impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

#[cfg(any(test, feature = "mock"))]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(duration);
    }
}
