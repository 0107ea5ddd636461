//! The process-wide dispatch table and the trampoline that consults it.

use std::sync::{Arc, OnceLock};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    engine::{CallFrame, TrampolineAction},
    intercept::Handler,
    member::MemberKey,
};

/// Maps each patched member to its active [`Handler`].
///
/// Entries live exactly as long as the owning plug is applied. Map operations hold a shard lock
/// only for the duration of the operation; handlers are cloned out before they run, so callbacks
/// may freely call other plugged members.
#[derive(Default)]
pub struct DispatchTable {
    handlers: DashMap<MemberKey, Arc<dyn Handler>>,
}

impl DispatchTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table consulted by [`trampoline`].
    #[must_use]
    pub fn global() -> &'static DispatchTable {
        static GLOBAL: OnceLock<DispatchTable> = OnceLock::new();
        GLOBAL.get_or_init(DispatchTable::new)
    }

    /// Makes `handler` the active handler for `key`.
    ///
    /// # Returns
    ///
    /// The handler that was previously active, if any.
    pub fn register(&self, key: MemberKey, handler: Arc<dyn Handler>) -> Option<Arc<dyn Handler>> {
        log::debug!("registering handler for {key}");
        self.handlers.insert(key, handler)
    }

    /// Removes whatever handler is active for `key`.
    pub fn unregister(&self, key: &MemberKey) -> Option<Arc<dyn Handler>> {
        self.handlers.remove(key).map(|(_, handler)| handler)
    }

    /// Removes the entry for `key` only if `handler` is the active one.
    ///
    /// # Returns
    ///
    /// `true` if the entry was removed.
    pub fn unregister_if(&self, key: &MemberKey, handler: &Arc<dyn Handler>) -> bool {
        self.handlers
            .remove_if(key, |_, active| Arc::ptr_eq(active, handler))
            .is_some()
    }

    /// Undoes a [`register`](Self::register) of `handler` for `key`.
    ///
    /// If `handler` is still the active one, `previous` becomes active again, or the entry is
    /// removed when there was none. Anything registered since is left alone.
    ///
    /// # Returns
    ///
    /// `true` if the table was changed.
    pub fn restore(
        &self,
        key: &MemberKey,
        handler: &Arc<dyn Handler>,
        previous: Option<Arc<dyn Handler>>,
    ) -> bool {
        match self.handlers.entry(key.clone()) {
            Entry::Occupied(mut entry) if Arc::ptr_eq(entry.get(), handler) => {
                match previous {
                    Some(previous) => {
                        entry.insert(previous);
                    }
                    None => {
                        entry.remove();
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// Returns the active handler for `key`.
    #[must_use]
    pub fn lookup(&self, key: &MemberKey) -> Option<Arc<dyn Handler>> {
        self.handlers.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Returns `true` if a handler is active for `key`.
    #[must_use]
    pub fn contains(&self, key: &MemberKey) -> bool {
        self.handlers.contains_key(key)
    }

    /// Returns the number of active handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handler is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// The trampoline installed into every plugged member.
///
/// Dispatches to the handler registered for `key` in [`DispatchTable::global`]. A member without
/// an active handler behaves as if it were not patched.
pub fn trampoline(key: &MemberKey, frame: &mut CallFrame) -> TrampolineAction {
    match DispatchTable::global().lookup(key) {
        Some(handler) => {
            log::trace!("dispatching {key}");
            handler.invoke(frame)
        }
        None => TrampolineAction::CallOriginal,
    }
}
