//! Conversions between Rust values and [`Value`].

use std::{
    any::Any,
    future::{ready, IntoFuture, Ready},
    sync::Arc,
};

use crate::{
    types::{ObjectRef, TypeRef, Value},
    Error, Result,
};

/// Builds the [`Error::Marshal`] raised when `value` cannot become a `T`.
pub(crate) fn marshal_error<T: Marshal>(value: &Value) -> Error {
    Error::Marshal {
        expected: T::type_ref().full_name(),
        found: value.kind().to_string(),
    }
}

/// A Rust type that can cross the interception boundary.
///
/// Implementations pair a [`TypeRef`] identity, used for signature validation, with lossless
/// conversions to and from [`Value`]. The crate implements `Marshal` for the primitive types,
/// `String`, `()`, `Option<T>` (nullable references), `Vec<T>`, [`Completed<T>`] and `Arc<T>`
/// for every `T: Reflect`.
pub trait Marshal: Sized + Send + 'static {
    /// The type identity used when validating signatures.
    fn type_ref() -> TypeRef;

    /// Converts the value into its erased form.
    fn into_value(self) -> Value;

    /// Recovers the value from its erased form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Marshal`] if `value` does not have the expected shape.
    fn from_value(value: Value) -> Result<Self>;
}

/// A user type that can be passed by shared reference through intercepted calls.
///
/// Implementing `Reflect` makes `Arc<T>` usable as a receiver, argument or return value.
///
/// # Examples
///
/// ```rust
/// use staticplug::types::{Reflect, TypeBuilder, TypeRef};
///
/// struct Repository;
///
/// impl Reflect for Repository {
///     fn type_ref() -> TypeRef {
///         TypeBuilder::class("App.Data", "Repository").build()
///     }
/// }
/// ```
pub trait Reflect: Any + Send + Sync {
    /// The runtime type of the implementing Rust type.
    fn type_ref() -> TypeRef;
}

impl Marshal for () {
    fn type_ref() -> TypeRef {
        TypeRef::void()
    }

    fn into_value(self) -> Value {
        Value::Void
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Void => Ok(()),
            other => Err(marshal_error::<Self>(&other)),
        }
    }
}

impl Marshal for bool {
    fn type_ref() -> TypeRef {
        TypeRef::boolean()
    }

    fn into_value(self) -> Value {
        Value::Bool(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(marshal_error::<Self>(&other)),
        }
    }
}

impl Marshal for char {
    fn type_ref() -> TypeRef {
        TypeRef::char()
    }

    fn into_value(self) -> Value {
        Value::Char(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Char(v) => Ok(v),
            other => Err(marshal_error::<Self>(&other)),
        }
    }
}

impl_marshal_int!(I32 as i32,
    i8 => TypeRef::i8,
    u8 => TypeRef::u8,
    i16 => TypeRef::i16,
    u16 => TypeRef::u16,
    i32 => TypeRef::i32,
    u32 => TypeRef::u32,
);

impl_marshal_int!(I64 as i64,
    i64 => TypeRef::i64,
    u64 => TypeRef::u64,
);

impl Marshal for f32 {
    fn type_ref() -> TypeRef {
        TypeRef::f32()
    }

    fn into_value(self) -> Value {
        Value::F32(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::F32(v) => Ok(v),
            other => Err(marshal_error::<Self>(&other)),
        }
    }
}

impl Marshal for f64 {
    fn type_ref() -> TypeRef {
        TypeRef::f64()
    }

    fn into_value(self) -> Value {
        Value::F64(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::F64(v) => Ok(v),
            other => Err(marshal_error::<Self>(&other)),
        }
    }
}

impl Marshal for String {
    fn type_ref() -> TypeRef {
        TypeRef::string()
    }

    fn into_value(self) -> Value {
        Value::String(self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::String(v) => Ok(v),
            other => Err(marshal_error::<Self>(&other)),
        }
    }
}

/// A nullable reference: `None` maps to [`Value::Null`].
impl<T: Marshal> Marshal for Option<T> {
    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn into_value(self) -> Value {
        self.map_or(Value::Null, Marshal::into_value)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn type_ref() -> TypeRef {
        TypeRef::array_of(T::type_ref())
    }

    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(Marshal::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(marshal_error::<Self>(&other)),
        }
    }
}

impl<T: Reflect> Marshal for Arc<T> {
    fn type_ref() -> TypeRef {
        T::type_ref()
    }

    fn into_value(self) -> Value {
        Value::Object(ObjectRef::new(T::type_ref(), self))
    }

    fn from_value(value: Value) -> Result<Self> {
        match &value {
            Value::Object(obj) => obj
                .downcast::<T>()
                .ok_or_else(|| marshal_error::<Self>(&value)),
            _ => Err(marshal_error::<Self>(&value)),
        }
    }
}

/// An asynchronous result that is already complete.
///
/// Members that return `Task` or `Task<T>` are modelled with `Completed<()>` and
/// `Completed<T>`. Awaiting a `Completed` yields the inner value immediately, which is what the
/// default-return behavior relies on: a plugged async member never hands its caller a missing or
/// malformed future.
///
/// # Examples
///
/// ```rust
/// use staticplug::types::Completed;
///
/// # async fn demo() {
/// let result = Completed::new(42).await;
/// assert_eq!(result, 42);
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completed<T>(T);

impl<T> Completed<T> {
    /// Wraps an already available result.
    #[must_use]
    pub fn new(value: T) -> Self {
        Completed(value)
    }

    /// Unwraps the result without awaiting.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> IntoFuture for Completed<T> {
    type Output = T;
    type IntoFuture = Ready<T>;

    fn into_future(self) -> Self::IntoFuture {
        ready(self.0)
    }
}

impl<T: Marshal> Marshal for Completed<T> {
    fn type_ref() -> TypeRef {
        let inner = T::type_ref();
        if inner.is_void() {
            TypeRef::task()
        } else {
            TypeRef::task_of(inner)
        }
    }

    fn into_value(self) -> Value {
        Value::Task(Box::new(self.0.into_value()))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Task(inner) => T::from_value(*inner).map(Completed),
            other => Err(marshal_error::<Self>(&other)),
        }
    }
}
