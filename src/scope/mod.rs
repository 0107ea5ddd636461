//! Batch application of plugs.
//!
//! [`apply_all`] takes a batch of plugs, acquires the lock of every plugged member, applies the
//! plugs and hands back a [`Scope`]. Releasing the scope (explicitly or by dropping it) removes
//! every redirection and frees the members for the next batch.
//!
//! # State Machine
//!
//! ```text
//! Created ──► Locking ──► Applying ──► Active ──► Releasing ──► Released
//!                │            │                       ▲
//!                └────────────┴───────── failure ─────┘
//! ```
//!
//! - The batch's lock set is every key of every plug (a property plug contributes the property
//!   and its accessors). Locks are acquired in ascending [`MemberKey`] order, so batches that
//!   share members never deadlock.
//! - Plugs are applied in the same order. If one fails, everything locked or applied so far is
//!   released before the error is returned.
//! - Release runs in reverse order and is idempotent.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::LazyLock;
//! use staticplug::{
//!     apply_all, engine::CallSite, member::MethodDescriptor, plugs,
//!     types::{TypeBuilder, TypeRef}, MethodPlug,
//! };
//!
//! static ANSWER: LazyLock<CallSite> = LazyLock::new(|| {
//!     let ty = TypeBuilder::class("Docs.Scope", "Oracle").build();
//!     CallSite::new(MethodDescriptor::static_method(ty, "Answer").returns(TypeRef::i32()))
//! });
//!
//! fn answer() -> i32 {
//!     ANSWER.call_static((), || 42)
//! }
//!
//! # async fn demo() -> staticplug::Result<()> {
//! let plug = MethodPlug::new(ANSWER.descriptor().clone())?.returns(|| 4)?;
//! let mut scope = apply_all(plugs![plug]).await?;
//! assert_eq!(answer(), 4);
//!
//! scope.release()?;
//! assert_eq!(answer(), 42);
//! # Ok(())
//! # }
//! ```

mod config;

pub use config::ScopeOptions;

use std::fmt;

use crate::{
    member::MemberKey,
    plug::{sealed::Lifecycle, Plug},
    Error, Result,
};

/// Lifecycle state of a [`Scope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum ScopeState {
    /// The batch was accepted.
    Created,
    /// Member locks are being acquired.
    Locking,
    /// Plugs are being applied.
    Applying,
    /// Every plug is applied.
    Active,
    /// Plugs are being released.
    Releasing,
    /// Every plug is released; further releases do nothing.
    Released,
}

/// An applied batch of plugs.
///
/// Dropping a scope releases it. Call [`release`](Self::release) directly to observe release
/// failures.
pub struct Scope {
    plugs: Vec<Box<dyn Plug>>,
    /// Every key of the batch in lock order, with the index of the plug that holds it.
    locks: Vec<(MemberKey, usize)>,
    state: ScopeState,
}

impl Scope {
    /// Validates the batch and puts it in canonical lock order.
    fn prepare(mut plugs: Vec<Box<dyn Plug>>) -> Result<Self> {
        if plugs.is_empty() {
            return Err(Error::EmptyBatch);
        }

        plugs.sort_by(|a, b| a.key().cmp(b.key()));

        let mut locks: Vec<(MemberKey, usize)> = plugs
            .iter()
            .enumerate()
            .flat_map(|(index, plug)| plug.keys().iter().map(move |key| (key.clone(), index)))
            .collect();
        locks.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(pair) = locks.windows(2).find(|pair| pair[0].0 == pair[1].0) {
            return Err(Error::DuplicateMember(pair[0].0.to_string()));
        }

        Ok(Self {
            plugs,
            locks,
            state: ScopeState::Created,
        })
    }

    fn transition(&mut self, state: ScopeState) {
        log::debug!("scope of {} plug(s): {} -> {state}", self.plugs.len(), self.state);
        self.state = state;
    }

    /// Applies every plug in order; on failure releases the whole batch and returns the error.
    fn activate(mut self, options: &ScopeOptions) -> Result<Self> {
        self.transition(ScopeState::Applying);
        for index in 0..self.plugs.len() {
            if let Err(e) = self.plugs[index].apply(&options.engine) {
                log::debug!("applying {} failed: {e}", self.plugs[index].id());
                self.rollback();
                return Err(e);
            }
        }
        self.transition(ScopeState::Active);
        Ok(self)
    }

    /// Releases after a failed lock or apply. The original failure is what the caller sees.
    fn rollback(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("rollback left an error behind: {e}");
        }
    }

    /// Releases every plug in reverse order.
    ///
    /// Every plug is released even if some fail. Calling this again after it returned does
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by the patch engine while removing redirections.
    pub fn release(&mut self) -> Result<()> {
        if self.state == ScopeState::Released {
            return Ok(());
        }

        self.transition(ScopeState::Releasing);
        let mut first_error = None;
        for plug in self.plugs.iter_mut().rev() {
            if let Err(e) = plug.release() {
                first_error.get_or_insert(e);
            }
        }
        self.transition(ScopeState::Released);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Returns `true` once the scope has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state == ScopeState::Released
    }

    /// Returns the number of plugs in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.plugs.len()
    }

    /// Always `false`: empty batches are rejected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugs.is_empty()
    }

    /// Returns the plug identifiers in application order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.plugs.iter().map(|plug| plug.id())
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::warn!("failed to release scope on drop: {e}");
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("state", &self.state)
            .field("plugs", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

/// Applies a batch of plugs with the default [`ScopeOptions`].
///
/// Waits until every plugged member is free. See [`apply_all_with`].
///
/// # Errors
///
/// See [`apply_all_with`].
pub async fn apply_all(plugs: Vec<Box<dyn Plug>>) -> Result<Scope> {
    apply_all_with(plugs, &ScopeOptions::default()).await
}

/// Applies a batch of plugs.
///
/// # Arguments
///
/// * `plugs` - The batch, typically built with [`plugs!`](crate::plugs)
/// * `options` - The patch engine and an optional cancellation token
///
/// # Errors
///
/// - [`Error::EmptyBatch`] if `plugs` is empty
/// - [`Error::DuplicateMember`] if two plugs target the same member
/// - [`Error::Cancelled`] if the token fires while waiting for a lock
/// - any error raised while applying a plug, such as [`Error::ParameterMismatch`]
///
/// In every failure case no lock is held and no redirection remains when this returns.
pub async fn apply_all_with(plugs: Vec<Box<dyn Plug>>, options: &ScopeOptions) -> Result<Scope> {
    let mut scope = Scope::prepare(plugs)?;

    scope.transition(ScopeState::Locking);
    for index in 0..scope.locks.len() {
        let (key, owner) = scope.locks[index].clone();
        match key.lock(options.cancellation.as_ref()).await {
            Ok(guard) => scope.plugs[owner].hold(guard),
            Err(e) => {
                scope.rollback();
                return Err(e);
            }
        }
    }

    scope.activate(options)
}

/// Applies a batch of plugs from synchronous code, with the default [`ScopeOptions`].
///
/// # Errors
///
/// See [`apply_all_blocking_with`].
///
/// # Panics
///
/// Panics if called from within an asynchronous runtime.
pub fn apply_all_blocking(plugs: Vec<Box<dyn Plug>>) -> Result<Scope> {
    apply_all_blocking_with(plugs, &ScopeOptions::default())
}

/// Applies a batch of plugs from synchronous code.
///
/// A cancellation token is honored between lock acquisitions only; a lock wait that has
/// started runs to completion.
///
/// # Errors
///
/// As [`apply_all_with`].
///
/// # Panics
///
/// Panics if called from within an asynchronous runtime.
pub fn apply_all_blocking_with(
    plugs: Vec<Box<dyn Plug>>,
    options: &ScopeOptions,
) -> Result<Scope> {
    let mut scope = Scope::prepare(plugs)?;

    scope.transition(ScopeState::Locking);
    for index in 0..scope.locks.len() {
        let (key, owner) = scope.locks[index].clone();
        if options
            .cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
        {
            scope.rollback();
            return Err(Error::Cancelled(key.to_string()));
        }
        let guard = key.blocking_lock();
        scope.plugs[owner].hold(guard);
    }

    scope.activate(options)
}
