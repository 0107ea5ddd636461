//! Scope configuration.
//!
//! [`ScopeOptions`] selects the patch engine a batch is applied with and an optional
//! cancellation token for the lock wait.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use staticplug::{engine::DetourEngine, ScopeOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let token = CancellationToken::new();
//! let options = ScopeOptions::default()
//!     .with_engine(Arc::new(DetourEngine::new()))
//!     .with_cancellation(token.clone());
//! ```

use std::{fmt, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::engine::{DetourEngine, PatchEngine};

/// Options for [`crate::apply_all_with`].
///
/// # Default Configuration
///
/// - The process-wide [`DetourEngine`]
/// - No cancellation: lock acquisition waits as long as necessary
#[derive(Clone)]
pub struct ScopeOptions {
    /// Engine that installs and removes the redirections.
    pub engine: Arc<dyn PatchEngine>,

    /// Token that aborts waiting for member locks.
    ///
    /// Once cancelled, [`crate::apply_all_with`] releases every lock it already holds and
    /// fails with [`crate::Error::Cancelled`].
    pub cancellation: Option<CancellationToken>,
}

impl Default for ScopeOptions {
    fn default() -> Self {
        Self {
            engine: DetourEngine::global(),
            cancellation: None,
        }
    }
}

impl ScopeOptions {
    /// Uses `engine` instead of the process-wide engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn PatchEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Allows the lock wait to be cancelled through `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

impl fmt::Debug for ScopeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeOptions")
            .field("cancellable", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}
