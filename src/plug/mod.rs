//! Per-member plug configuration.
//!
//! A plug is the object a test builds up for one member: what the member should return, which
//! side effects should run, and whether the original implementation still executes. Plugs do
//! nothing on their own; they take effect when handed to [`crate::apply_all`], which locks their
//! members and applies them as one batch.
//!
//! # Key Components
//!
//! - [`Plug`] - The sealed trait the scope controller drives
//! - [`MethodPlug`] - Configuration for a static or instance method
//! - [`PropertyPlug`] - Configuration for a property's getter and setter
//!
//! # Examples
//!
//! ```rust,ignore
//! use staticplug::{apply_all, plugs, MethodPlug, PropertyPlug};
//!
//! let clock = MethodPlug::new(now_descriptor())?.returns_value(1_700_000_000_i64)?;
//! let level = PropertyPlug::new(level_descriptor()).returns(|| 3)?;
//!
//! let scope = apply_all(plugs![clock, level]).await?;
//! // run the code under test
//! scope.release()?;
//! ```

mod method;
mod property;

pub use method::MethodPlug;
pub use property::PropertyPlug;

use std::sync::Arc;

use crate::{
    engine::{PatchEngine, PatchHandle},
    intercept::{trampoline, DispatchTable, Handler},
    member::{KeyGuard, MemberKey, MethodDescriptor},
    Result,
};

pub(crate) mod sealed {
    use std::sync::Arc;

    use crate::{engine::PatchEngine, member::KeyGuard, Result};

    /// Lifecycle hooks only the scope controller may call.
    pub trait Lifecycle {
        /// Takes ownership of one of the plug's member locks.
        fn hold(&mut self, guard: KeyGuard);

        /// Registers the handlers and installs the redirections.
        fn apply(&mut self, engine: &Arc<dyn PatchEngine>) -> Result<()>;

        /// Undoes [`apply`](Self::apply) and releases the member lock. Idempotent.
        fn release(&mut self) -> Result<()>;
    }
}

/// A configured member replacement.
///
/// This trait is sealed; [`MethodPlug`] and [`PropertyPlug`] are its only implementations.
pub trait Plug: Send + sealed::Lifecycle {
    /// Returns the plug identifier, `staticplug.<member description>`.
    fn id(&self) -> &str;

    /// Returns the key of the plugged member.
    fn key(&self) -> &MemberKey;

    /// Returns every key whose lock this plug takes, the plugged member's key first.
    ///
    /// A property plug also locks the keys of its accessors, so a batch plugging an accessor
    /// directly waits for it.
    fn keys(&self) -> &[MemberKey];

    /// Returns `true` while the plug's redirections are active.
    fn is_applied(&self) -> bool;
}

struct AppliedPatch {
    handle: PatchHandle,
    handler: Arc<dyn Handler>,
    engine: Arc<dyn PatchEngine>,
}

/// Lifecycle state shared by every plug.
pub(crate) struct PlugCore {
    id: String,
    key: MemberKey,
    keys: Vec<MemberKey>,
    guards: Vec<KeyGuard>,
    patches: Vec<AppliedPatch>,
    applied: bool,
}

impl PlugCore {
    pub(crate) fn new(id: String, key: MemberKey) -> Self {
        Self {
            id,
            keys: vec![key.clone()],
            key,
            guards: Vec::new(),
            patches: Vec::new(),
            applied: false,
        }
    }

    /// Adds further keys to the lock set.
    pub(crate) fn with_keys(mut self, keys: impl IntoIterator<Item = MemberKey>) -> Self {
        for key in keys {
            if !self.keys.contains(&key) {
                self.keys.push(key);
            }
        }
        self
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn key(&self) -> &MemberKey {
        &self.key
    }

    pub(crate) fn keys(&self) -> &[MemberKey] {
        &self.keys
    }

    pub(crate) fn is_applied(&self) -> bool {
        self.applied
    }

    pub(crate) fn hold(&mut self, guard: KeyGuard) {
        self.guards.push(guard);
    }

    pub(crate) fn mark_applied(&mut self) {
        self.applied = true;
        log::debug!("applied {}", self.id);
    }

    /// Validates `handler` against `target`, registers it and installs the trampoline.
    ///
    /// On failure the dispatch table is left as it was found.
    pub(crate) fn patch(
        &mut self,
        engine: &Arc<dyn PatchEngine>,
        target: &MethodDescriptor,
        handler: &Arc<dyn Handler>,
        call_original: bool,
    ) -> Result<()> {
        handler.set_call_original(call_original);
        handler.assert_matches(target)?;

        let table = DispatchTable::global();
        let key = handler.key().clone();
        let previous = table.register(key.clone(), Arc::clone(handler));

        match engine.install(target, trampoline) {
            Ok(handle) => {
                self.patches.push(AppliedPatch {
                    handle,
                    handler: Arc::clone(handler),
                    engine: Arc::clone(engine),
                });
                Ok(())
            }
            Err(e) => {
                table.restore(&key, handler, previous);
                Err(e)
            }
        }
    }

    /// Removes every patch in reverse order, then drops the member locks.
    ///
    /// All patches are removed even if some fail; the first failure is returned.
    pub(crate) fn release(&mut self) -> Result<()> {
        let mut first_error = None;

        while let Some(patch) = self.patches.pop() {
            DispatchTable::global().unregister_if(patch.handle.key(), &patch.handler);
            if let Err(e) = patch.engine.uninstall(&patch.handle) {
                log::warn!("failed to remove {} for {}: {e}", patch.handle, self.id);
                first_error.get_or_insert(e);
            }
        }

        if self.applied {
            log::debug!("released {}", self.id);
        }
        self.applied = false;
        self.guards.clear();

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
