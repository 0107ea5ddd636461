//! # staticplug Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the staticplug library. Import this module to get quick access to everything a test
//! needs to describe, plug and release members.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all staticplug operations
pub use crate::Error;

/// The result type used throughout staticplug
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Batch application and the resulting scope
pub use crate::scope::{
    apply_all, apply_all_blocking, apply_all_blocking_with, apply_all_with, Scope, ScopeOptions,
    ScopeState,
};

/// Boxes plugs into a batch
pub use crate::plugs;

// ================================================================================================
// Plugs
// ================================================================================================

/// Per-member configuration
pub use crate::plug::{MethodPlug, Plug, PropertyPlug};

// ================================================================================================
// Members
// ================================================================================================

/// Member descriptors, keys and lookup
pub use crate::member::{
    MemberFlags, MemberIdentity, MemberKey, MethodDescriptor, PropertyDescriptor, TypeInfo,
};

// ================================================================================================
// Type System
// ================================================================================================

/// Type identities, runtime values and marshaling
pub use crate::types::{
    Completed, Marshal, ObjectRef, Reflect, TypeBuilder, TypeFlavor, TypeRef, Value,
};

// ================================================================================================
// Interception
// ================================================================================================

/// Callbacks and the dispatch table
pub use crate::intercept::{Callback, DispatchTable, Handler, IntoCallback};

/// The patch engine boundary and the in-process engine
pub use crate::engine::{
    CallFrame, CallSite, DetourEngine, PatchEngine, PatchHandle, Trampoline, TrampolineAction,
};
