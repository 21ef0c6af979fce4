//! Long-lived browser automation handle shared by vision-assisted collectors.
//!
//! The handle is owned by the composition root, launched on first use and
//! released by an explicit [`SharedBrowser::shutdown`] call on process exit.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("page capture failed: {0}")]
    Capture(String),
    #[error("browser handle has been shut down")]
    Closed,
}

pub type BrowserFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BrowserError>> + Send + 'a>>;

/// One running automation engine.
pub trait BrowserSession: Send + Sync {
    /// Loads `url` and returns a PNG screenshot of the rendered page.
    fn capture<'a>(&'a self, url: &'a str) -> BrowserFuture<'a, Vec<u8>>;

    fn close<'a>(&'a self) -> BrowserFuture<'a, ()>;
}

/// Starts automation engines. Implemented by the host (headless Chrome, a
/// remote browser service, or a stub in tests).
pub trait BrowserLauncher: Send + Sync {
    fn launch<'a>(&'a self) -> BrowserFuture<'a, Arc<dyn BrowserSession>>;
}

/// Lazily launched browser shared across calls.
pub struct SharedBrowser {
    launcher: Arc<dyn BrowserLauncher>,
    session: Mutex<Option<Arc<dyn BrowserSession>>>,
    closed: AtomicBool,
}

impl SharedBrowser {
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            session: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the running session, launching it on first use.
    pub async fn session(&self) -> Result<Arc<dyn BrowserSession>, BrowserError> {
        let mut slot = self.session.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(BrowserError::Closed);
        }
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }

        let session = self.launcher.launch().await?;
        info!("browser session launched");
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    pub async fn capture(&self, url: &str) -> Result<Vec<u8>, BrowserError> {
        let session = self.session().await?;
        debug!(url, "capturing page");
        session.capture(url).await
    }

    pub async fn is_launched(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the session if one was launched. Idempotent; later calls to
    /// [`session`](Self::session) fail with [`BrowserError::Closed`].
    pub async fn shutdown(&self) -> Result<(), BrowserError> {
        let mut slot = self.session.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let Some(session) = slot.take() else {
            return Ok(());
        };
        match session.close().await {
            Ok(()) => {
                info!("browser session closed");
                Ok(())
            }
            Err(error) => {
                warn!(%error, "browser session did not close cleanly");
                Err(error)
            }
        }
    }
}
