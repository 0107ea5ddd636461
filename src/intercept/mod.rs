//! Interception core: callbacks, handlers and dispatch.
//!
//! Every patched member enters the same stateless [`trampoline`], which recovers the member's
//! active [`Handler`] from the [`DispatchTable`] and lets it decide what the caller observes.
//!
//! # Architecture
//!
//! ```text
//! call to plugged member
//!        │
//!        ▼
//!   trampoline(key, frame) ──► DispatchTable::global().lookup(key)
//!        │                               │
//!        │                               ▼
//!        │                    Handler::invoke(frame) ──► Callback::invoke(args)
//!        ▼
//!   TrampolineAction ──► engine runs the original or returns the frame result
//! ```
//!
//! # Handler Variants
//!
//! | Handler | Member | Caller observes |
//! |---------|--------|-----------------|
//! | [`ActionHandler`] | `void` | nothing |
//! | [`FuncHandler`] | value-returning | the callback's value |
//! | [`DefaultReturnHandler`] | value-returning | the default of the return type |
//!
//! Static and instance members share these variants; instance handlers additionally accept a
//! leading receiver parameter in the callback. Any handler with call-through enabled lets the
//! original implementation run afterwards, and the original's value prevails.

mod callback;
mod dispatch;
mod handler;

pub use callback::{Callback, Erased, IntoCallback};
pub use dispatch::{trampoline, DispatchTable};
pub use handler::{ActionHandler, DefaultReturnHandler, FuncHandler, Handler};

pub(crate) use callback::next_arg;
