// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # staticplug
//!
//! Scoped test doubles for members that virtual-dispatch mocking cannot reach: static methods,
//! static properties, and non-virtual instance methods and properties.
//!
//! A test describes the member it wants to replace, configures a plug with the replacement
//! behavior, and applies a batch of plugs. While the returned [`Scope`] is alive every call to a
//! plugged member is redirected to the test's callback; releasing the scope restores the
//! original behavior.
//!
//! ## Features
//!
//! - **Interned member identities** - [`member::MemberKey`] gives every distinct member one
//!   canonical key that doubles as its mutual-exclusion token
//! - **Signature validation** - callbacks are checked against the real member when applied, with
//!   diagnostics naming the member and both signatures
//! - **Serialized batches** - concurrent tests plugging the same member wait for each other
//!   instead of racing
//! - **Exception-safe rollback** - a batch that fails half way is fully undone before the error
//!   surfaces
//! - **Async aware** - default returns for `Task<T>` members are completed tasks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::LazyLock;
//! use staticplug::prelude::*;
//!
//! // The member under test routes its body through a call site.
//! static NOW: LazyLock<CallSite> = LazyLock::new(|| {
//!     let clock = TypeBuilder::class("App", "Clock").build();
//!     CallSite::new(MethodDescriptor::static_method(clock, "Now").returns(TypeRef::i64()))
//! });
//!
//! fn now() -> i64 {
//!     NOW.call_static((), || 1_700_000_000)
//! }
//!
//! # async fn demo() -> staticplug::Result<()> {
//! let plug = MethodPlug::new(NOW.descriptor().clone())?.returns_value(0_i64)?;
//!
//! let scope = apply_all(plugs![plug]).await?;
//! assert_eq!(now(), 0);
//! drop(scope);
//!
//! assert_eq!(now(), 1_700_000_000);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Type identities, runtime values and marshaling
//! - [`member`] - Member descriptors, canonical keys and name-based lookup
//! - [`engine`] - The patch engine boundary and the in-process detour engine
//! - [`intercept`] - Callbacks, handlers, the dispatch table and the trampoline
//! - [`plug`] - Per-member configuration
//! - [`scope`] - Batch application and release
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`], with [`Error`] describing what went wrong.
//! Configuration mistakes surface immediately; signature mismatches surface when the batch is
//! applied, after the batch has been rolled back.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use staticplug::prelude::*;
///
/// let host = TypeBuilder::class("App", "Host").build();
/// let plug = MethodPlug::new(MethodDescriptor::static_method(host, "Run"))?.callback(|| {});
/// # Ok::<(), staticplug::Error>(())
/// ```
pub mod prelude;

pub mod engine;
pub mod intercept;
pub mod member;
pub mod plug;
pub mod scope;
pub mod types;

/// `staticplug` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `staticplug` Error type
///
/// Every failure in this crate is reported through this single type. The variants are grouped
/// into configuration, resolution, signature, scope and patch engine errors.
pub use error::Error;

pub use plug::{MethodPlug, Plug, PropertyPlug};
pub use scope::{
    apply_all, apply_all_blocking, apply_all_blocking_with, apply_all_with, Scope, ScopeOptions,
    ScopeState,
};
