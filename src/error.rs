use thiserror::Error;

/// Builds an [`Error::Configuration`] from a message or a format string.
macro_rules! config_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Configuration($msg.to_string())
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Configuration(format!($fmt, $($arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every failure surfaces as this single error kind carrying a human-readable diagnostic. There
/// is no status-code channel: callers are expected to propagate these errors and fail the
/// enclosing test.
///
/// # Error Categories
///
/// ## Configuration Errors
/// Raised synchronously while a plug is being configured.
/// - [`Error::Configuration`] - Malformed input such as an empty member name
/// - [`Error::MissingGetter`] - Return value requested for a write-only property
/// - [`Error::MissingSetter`] - Setter callback requested for a read-only property
/// - [`Error::NotValueReturning`] - Return value requested for a `void` method
///
/// ## Resolution Errors
/// Raised by [`crate::member::TypeInfo`] lookups.
/// - [`Error::MissingMember`] - No member with the requested name exists
/// - [`Error::AmbiguousMember`] - Overloads could not be narrowed by parameter types
/// - [`Error::StaticMismatch`] - A static member was requested as an instance member or vice versa
///
/// ## Signature Errors
/// Raised at apply time, when the callback is checked against the real member.
/// - [`Error::ParameterMismatch`] - Callback parameters incompatible with the member's parameters
/// - [`Error::ReturnTypeMismatch`] - Callback return type incompatible with the member's
///
/// ## Scope and Engine Errors
/// - [`Error::EmptyBatch`] - [`crate::apply_all`] called without plugs
/// - [`Error::DuplicateMember`] - Two plugs in one batch target the same member
/// - [`Error::Cancelled`] - Lock acquisition was cancelled
/// - [`Error::AlreadyPatched`] - The patch engine already holds a detour for the member
/// - [`Error::UnknownPatch`] - The patch engine does not know the handle being removed
/// - [`Error::Marshal`] - A runtime value did not have the expected shape
///
/// # Examples
///
/// ```rust,ignore
/// use staticplug::{apply_all, plugs, Error, MethodPlug};
///
/// match apply_all(plugs![plug]).await {
///     Ok(scope) => { /* run the test body */ }
///     Err(Error::ParameterMismatch { member, .. }) => {
///         eprintln!("callback does not fit {member}");
///     }
///     Err(e) => eprintln!("{e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    /// The plug configuration is malformed.
    ///
    /// Covers caller misuse that is detected eagerly, such as an empty or whitespace-only
    /// member name handed to a locator.
    #[error("{0}")]
    Configuration(String),

    /// A getter replacement was requested for a property without a getter.
    ///
    /// The associated value is the fully qualified property name.
    #[error("Property '{0}' does not have a getter")]
    MissingGetter(String),

    /// A setter replacement was requested for a property without a setter.
    ///
    /// The associated value is the fully qualified property name.
    #[error("Property '{0}' does not have a setter")]
    MissingSetter(String),

    /// A return value was supplied for a method that returns `void`.
    ///
    /// The associated value is the fully qualified method name.
    #[error("Method '{0}' does not return a value")]
    NotValueReturning(String),

    // Resolution errors
    /// The requested member does not exist on the declaring type.
    #[error("Could not find {kind} '{name}' on '{declaring_type}'")]
    MissingMember {
        /// The kind of member that was requested (`method` or `property`)
        kind: &'static str,
        /// The requested member name
        name: String,
        /// The full name of the type that was searched
        declaring_type: String,
    },

    /// Several overloads share the requested name and none matches the supplied parameters.
    #[error("Could not find method '{name}' on '{declaring_type}' with parameter type(s) {parameters}")]
    AmbiguousMember {
        /// The requested method name
        name: String,
        /// The full name of the type that was searched
        declaring_type: String,
        /// The requested parameter types, comma separated
        parameters: String,
    },

    /// A static member was requested through the instance API, or vice versa.
    ///
    /// The message names the member, its declaring type, and the API to use instead.
    #[error("{0}")]
    StaticMismatch(String),

    // Signature errors
    /// The callback's parameter list cannot receive the member's arguments.
    ///
    /// Both lists are rendered in declaration order. For instance members the original list
    /// starts with an explicit `<Type> this` receiver entry.
    #[error("Plug for {member} has parameters ({callback}) that do not match original method parameters ({original})")]
    ParameterMismatch {
        /// The fully qualified name of the plugged member
        member: String,
        /// The callback's parameter types
        callback: String,
        /// The member's parameter types
        original: String,
    },

    /// The callback's return type cannot stand in for the member's return type.
    #[error("Plug for {member} has return type ({callback}) that do not match original method return type ({original})")]
    ReturnTypeMismatch {
        /// The fully qualified name of the plugged member
        member: String,
        /// The callback's return type
        callback: String,
        /// The member's return type
        original: String,
    },

    // Scope errors
    /// A batch was applied without any plugs.
    #[error("At least one plug must be specified")]
    EmptyBatch,

    /// Two plugs in one batch target the same member.
    ///
    /// Both would need the same member lock, so the batch could never make progress.
    #[error("Member '{0}' is plugged more than once in the same batch")]
    DuplicateMember(String),

    /// Waiting for a member lock was cancelled.
    #[error("Lock acquisition for '{0}' was cancelled")]
    Cancelled(String),

    // Patch engine errors
    /// The patch engine already holds a redirection for this member.
    #[error("Member '{0}' is already patched")]
    AlreadyPatched(String),

    /// The patch engine does not know the handle being uninstalled.
    #[error("Patch #{id} for '{member}' is not installed")]
    UnknownPatch {
        /// The engine-assigned patch id
        id: u64,
        /// The member the handle was created for
        member: String,
    },

    /// A runtime value did not have the shape its declared type requires.
    #[error("Expected a value of type {expected}, found {found}")]
    Marshal {
        /// The expected type name
        expected: String,
        /// A description of the value that was found
        found: String,
    },

    /// Generic error for miscellaneous failures.
    ///
    /// Used by patch engine implementations that wrap foreign errors.
    #[error("{0}")]
    Error(String),
}
