//! The boundary to the patch engine.
//!
//! A patch engine redirects calls to a member into a fixed-signature trampoline and can later
//! undo that redirection. The interception core only ever talks to it through the
//! [`PatchEngine`] trait, so any mechanism satisfying the contract can be plugged in.
//!
//! # Key Components
//!
//! - [`PatchEngine`] - Install and uninstall redirections
//! - [`Trampoline`] - The function every redirected call enters
//! - [`CallFrame`] - Receiver, arguments and output slot of one intercepted call
//! - [`TrampolineAction`] - Whether the original implementation runs after the trampoline
//! - [`DetourEngine`] / [`CallSite`] - The in-process engine shipped with the crate
//!
//! # Invocation Protocol
//!
//! | Trampoline answer | Original runs | Caller observes |
//! |-------------------|---------------|-----------------|
//! | [`SkipOriginal`](TrampolineAction::SkipOriginal) | No | The frame's result slot (`void` if unset) |
//! | [`CallOriginal`](TrampolineAction::CallOriginal) | Yes | The original's return value |
//!
//! If the trampoline records an error in the frame, the call fails with that error instead.

mod detour;

pub use detour::{CallSite, DetourEngine};

use std::fmt;

use crate::{
    member::{MemberKey, MethodDescriptor},
    types::Value,
    Error, Result,
};

/// What happens after the trampoline returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum TrampolineAction {
    /// The original implementation is skipped; the frame's result is returned.
    SkipOriginal,
    /// The original implementation runs and its result is returned.
    CallOriginal,
}

/// The entry point installed into every patched member.
///
/// The trampoline is stateless: it recovers the active handler from the key it is called with.
pub type Trampoline = fn(&MemberKey, &mut CallFrame) -> TrampolineAction;

/// The state of one intercepted call.
///
/// # Examples
///
/// ```rust
/// use staticplug::{engine::CallFrame, types::Value};
///
/// let mut frame = CallFrame::new(vec![Value::I32(1)]);
/// frame.set_result(Value::I32(2));
/// assert_eq!(frame.result(), Some(&Value::I32(2)));
/// ```
#[derive(Debug, Default)]
pub struct CallFrame {
    receiver: Option<Value>,
    args: Vec<Value>,
    result: Option<Value>,
    error: Option<Error>,
}

impl CallFrame {
    /// Creates a frame for a static call.
    #[must_use]
    pub fn new(args: Vec<Value>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    /// Creates a frame for an instance call.
    #[must_use]
    pub fn with_receiver(receiver: Value, args: Vec<Value>) -> Self {
        Self {
            receiver: Some(receiver),
            args,
            ..Self::default()
        }
    }

    /// Returns the receiver of an instance call.
    #[must_use]
    pub fn receiver(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }

    /// Returns the declared arguments, excluding the receiver.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns the output slot.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Fills the output slot.
    pub fn set_result(&mut self, value: Value) {
        self.result = Some(value);
    }

    /// Empties the output slot.
    pub fn take_result(&mut self) -> Option<Value> {
        self.result.take()
    }

    /// Records a failure of the redirected call.
    pub fn fail(&mut self, error: Error) {
        self.error = Some(error);
    }

    /// Removes the recorded failure.
    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }
}

/// A redirection installed by a [`PatchEngine`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PatchHandle {
    id: u64,
    key: MemberKey,
}

impl PatchHandle {
    /// Creates a handle. Only patch engines should call this.
    #[must_use]
    pub fn new(id: u64, key: MemberKey) -> Self {
        Self { id, key }
    }

    /// Returns the engine-assigned id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the patched member.
    #[must_use]
    pub fn key(&self) -> &MemberKey {
        &self.key
    }
}

impl fmt::Display for PatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "patch #{} on {}", self.id, self.key)
    }
}

/// Installs and removes call redirections.
///
/// Implementations must be usable from any thread. An engine holds at most one redirection per
/// member; the locking done by [`crate::apply_all`] guarantees the core never asks for a second.
pub trait PatchEngine: Send + Sync {
    /// Redirects every call to `target` into `trampoline`.
    ///
    /// # Errors
    ///
    /// Returns an error if the member cannot be patched, e.g. [`Error::AlreadyPatched`].
    fn install(&self, target: &MethodDescriptor, trampoline: Trampoline) -> Result<PatchHandle>;

    /// Removes a redirection created by [`install`](Self::install).
    ///
    /// # Errors
    ///
    /// Returns an error if `handle` is not installed, e.g. [`Error::UnknownPatch`].
    fn uninstall(&self, handle: &PatchHandle) -> Result<()>;
}

/// Converts a tuple of typed arguments into erased call arguments.
///
/// Implemented for tuples of up to eight [`crate::types::Marshal`] values.
pub trait IntoArgs {
    /// Marshals every element in order.
    fn into_args(self) -> Vec<Value>;
}
