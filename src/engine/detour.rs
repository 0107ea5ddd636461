//! In-process patch engine.
//!
//! Rust cannot rewrite compiled function bodies portably, so members that should be pluggable
//! route their body through a [`CallSite`]. The site asks the [`DetourEngine`] whether a
//! redirection is installed for its member and, if so, enters the trampoline instead of running
//! the body directly.
//!
//! ```rust
//! use std::sync::LazyLock;
//! use staticplug::{engine::CallSite, member::MethodDescriptor, types::{TypeBuilder, TypeRef}};
//!
//! fn answer() -> i32 {
//!     static SITE: LazyLock<CallSite> = LazyLock::new(|| {
//!         let ty = TypeBuilder::class("Docs.Detour", "Oracle").build();
//!         CallSite::new(MethodDescriptor::static_method(ty, "Answer").returns(TypeRef::i32()))
//!     });
//!     SITE.call_static((), || 42)
//! }
//!
//! assert_eq!(answer(), 42);
//! ```

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, OnceLock,
};

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    engine::{CallFrame, IntoArgs, PatchEngine, PatchHandle, Trampoline, TrampolineAction},
    member::{MemberKey, MethodDescriptor},
    types::{Marshal, Value},
    Error, Result,
};

#[derive(Clone, Copy)]
struct Detour {
    id: u64,
    trampoline: Trampoline,
}

/// A table of installed redirections, keyed by member.
///
/// The process-wide instance returned by [`DetourEngine::global`] is what [`CallSite::new`] and
/// the default [`crate::ScopeOptions`] use. Separate instances are fully isolated from it.
pub struct DetourEngine {
    detours: DashMap<MemberKey, Detour>,
    next_id: AtomicU64,
}

impl Default for DetourEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetourEngine {
    /// Creates an engine without any redirections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detours: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Returns the process-wide engine.
    #[must_use]
    pub fn global() -> Arc<DetourEngine> {
        static GLOBAL: OnceLock<Arc<DetourEngine>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(DetourEngine::new())))
    }

    /// Returns `true` if calls to `key` are currently redirected.
    #[must_use]
    pub fn is_patched(&self, key: &MemberKey) -> bool {
        self.detours.contains_key(key)
    }

    /// Returns the number of installed redirections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.detours.len()
    }

    /// Returns `true` if nothing is installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detours.is_empty()
    }

    /// Runs one call to `key`, entering the trampoline if a redirection is installed.
    ///
    /// # Arguments
    ///
    /// * `key` - The member being called
    /// * `receiver` - The receiver for instance members
    /// * `args` - The declared arguments
    /// * `original` - The member's real body
    ///
    /// # Errors
    ///
    /// Returns the error recorded by the trampoline, e.g. a callback whose arguments could not
    /// be marshaled.
    pub fn invoke(
        &self,
        key: &MemberKey,
        receiver: Option<Value>,
        args: Vec<Value>,
        original: impl FnOnce() -> Value,
    ) -> Result<Value> {
        // Copy the detour out so the shard lock is not held while the trampoline runs.
        let Some(detour) = self.detours.get(key).map(|entry| *entry) else {
            return Ok(original());
        };

        let mut frame = match receiver {
            Some(receiver) => CallFrame::with_receiver(receiver, args),
            None => CallFrame::new(args),
        };

        let action = (detour.trampoline)(key, &mut frame);
        if let Some(error) = frame.take_error() {
            return Err(error);
        }

        match action {
            TrampolineAction::CallOriginal => Ok(original()),
            TrampolineAction::SkipOriginal => Ok(frame.take_result().unwrap_or(Value::Void)),
        }
    }
}

impl PatchEngine for DetourEngine {
    fn install(&self, target: &MethodDescriptor, trampoline: Trampoline) -> Result<PatchHandle> {
        let key = target.key();
        match self.detours.entry(key.clone()) {
            Entry::Occupied(_) => Err(Error::AlreadyPatched(key.to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                slot.insert(Detour { id, trampoline });
                log::debug!("installed detour #{id} for {key}");
                Ok(PatchHandle::new(id, key))
            }
        }
    }

    fn uninstall(&self, handle: &PatchHandle) -> Result<()> {
        match self
            .detours
            .remove_if(handle.key(), |_, detour| detour.id == handle.id())
        {
            Some(_) => {
                log::debug!("removed detour #{} for {}", handle.id(), handle.key());
                Ok(())
            }
            None => Err(Error::UnknownPatch {
                id: handle.id(),
                member: handle.key().to_string(),
            }),
        }
    }
}

/// An instrumented call site for one member.
///
/// Keep one `CallSite` per member, typically in a `static LazyLock`, and route the member's body
/// through [`call_static`](Self::call_static) or [`call_instance`](Self::call_instance).
pub struct CallSite {
    descriptor: MethodDescriptor,
    key: MemberKey,
    engine: Arc<DetourEngine>,
}

impl CallSite {
    /// Creates a call site served by the process-wide engine.
    #[must_use]
    pub fn new(descriptor: MethodDescriptor) -> Self {
        Self::with_engine(descriptor, DetourEngine::global())
    }

    /// Creates a call site served by `engine`.
    #[must_use]
    pub fn with_engine(descriptor: MethodDescriptor, engine: Arc<DetourEngine>) -> Self {
        let key = descriptor.key();
        Self {
            descriptor,
            key,
            engine,
        }
    }

    /// Returns the member this site calls.
    #[must_use]
    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    /// Returns the member's key.
    #[must_use]
    pub fn key(&self) -> &MemberKey {
        &self.key
    }

    /// Calls the member with erased values.
    ///
    /// # Errors
    ///
    /// Returns the error recorded by the trampoline.
    pub fn try_invoke(
        &self,
        receiver: Option<Value>,
        args: Vec<Value>,
        original: impl FnOnce() -> Value,
    ) -> Result<Value> {
        self.engine.invoke(&self.key, receiver, args, original)
    }

    /// Calls a static member.
    ///
    /// # Errors
    ///
    /// Returns the error recorded by the trampoline, or [`Error::Marshal`] if the redirected
    /// call produced a value of the wrong shape.
    pub fn try_call_static<A, R>(&self, args: A, original: impl FnOnce() -> R) -> Result<R>
    where
        A: IntoArgs,
        R: Marshal,
    {
        let value = self.try_invoke(None, args.into_args(), || original().into_value())?;
        R::from_value(value)
    }

    /// Calls an instance member on `receiver`.
    ///
    /// # Errors
    ///
    /// As [`try_call_static`](Self::try_call_static).
    pub fn try_call_instance<S, A, R>(
        &self,
        receiver: &S,
        args: A,
        original: impl FnOnce() -> R,
    ) -> Result<R>
    where
        S: Marshal + Clone,
        A: IntoArgs,
        R: Marshal,
    {
        let receiver = receiver.clone().into_value();
        let value = self.try_invoke(Some(receiver), args.into_args(), || {
            original().into_value()
        })?;
        R::from_value(value)
    }

    /// Calls a static member, panicking if the redirected call fails.
    ///
    /// A failing redirected call means the installed test double is broken, so the panic
    /// fails the test at the call site.
    ///
    /// # Panics
    ///
    /// Panics with the error message if [`try_call_static`](Self::try_call_static) fails.
    pub fn call_static<A, R>(&self, args: A, original: impl FnOnce() -> R) -> R
    where
        A: IntoArgs,
        R: Marshal,
    {
        match self.try_call_static(args, original) {
            Ok(value) => value,
            Err(e) => panic!("call to {} failed: {e}", self.key),
        }
    }

    /// Calls an instance member, panicking if the redirected call fails.
    ///
    /// # Panics
    ///
    /// Panics with the error message if [`try_call_instance`](Self::try_call_instance) fails.
    pub fn call_instance<S, A, R>(&self, receiver: &S, args: A, original: impl FnOnce() -> R) -> R
    where
        S: Marshal + Clone,
        A: IntoArgs,
        R: Marshal,
    {
        match self.try_call_instance(receiver, args, original) {
            Ok(value) => value,
            Err(e) => panic!("call to {} failed: {e}", self.key),
        }
    }
}
