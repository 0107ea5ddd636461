//! Erased callbacks and their typed constructors.

use std::{fmt, sync::Arc};

use crate::{
    types::{TypeRef, Value},
    Error, Result,
};

type CallbackFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

/// A test-supplied callback with its declared signature.
///
/// The core only ever calls callbacks with an argument array and reads back one [`Value`]; the
/// declared parameter and return types are kept alongside for validation against the real
/// member. Typed closures become callbacks through [`IntoCallback`].
///
/// # Examples
///
/// ```rust
/// use staticplug::{intercept::Callback, types::{TypeRef, Value}};
///
/// let double = Callback::new(vec![TypeRef::i32()], TypeRef::i32(), |args| match args {
///     [Value::I32(v)] => Ok(Value::I32(v * 2)),
///     _ => Ok(Value::Null),
/// });
///
/// assert_eq!(double.invoke(&[Value::I32(21)])?, Value::I32(42));
/// # Ok::<(), staticplug::Error>(())
/// ```
#[derive(Clone)]
pub struct Callback {
    parameters: Vec<TypeRef>,
    return_type: TypeRef,
    body: Arc<CallbackFn>,
}

impl Callback {
    /// Creates a callback from an erased body.
    ///
    /// # Arguments
    ///
    /// * `parameters` - The declared parameter types, including a receiver if the callback
    ///   takes one
    /// * `return_type` - The declared return type, `System.Void` for side-effect callbacks
    /// * `body` - The implementation
    pub fn new<F>(parameters: Vec<TypeRef>, return_type: TypeRef, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            parameters,
            return_type,
            body: Arc::new(body),
        }
    }

    /// Creates a parameterless callback that always returns `value`.
    #[must_use]
    pub fn constant(return_type: TypeRef, value: Value) -> Self {
        Self::new(Vec::new(), return_type, move |_| Ok(value.clone()))
    }

    /// Returns the declared parameter types.
    #[must_use]
    pub fn parameters(&self) -> &[TypeRef] {
        &self.parameters
    }

    /// Returns the declared return type.
    #[must_use]
    pub fn return_type(&self) -> &TypeRef {
        &self.return_type
    }

    /// Returns `true` unless the callback is declared `void`.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    /// Runs the callback.
    ///
    /// # Errors
    ///
    /// Returns whatever the body returns, typically [`Error::Marshal`] when an argument does
    /// not have the declared type.
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        (self.body)(args)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

/// Marker for [`Callback`] values passed where a typed closure is accepted.
pub struct Erased;

/// Conversion of a closure into a [`Callback`].
///
/// Implemented for every `Fn` taking up to eight [`crate::types::Marshal`] arguments and
/// returning a `Marshal` value, and for [`Callback`] itself. The type parameters only exist to
/// keep the arity impls apart; callers never name them.
pub trait IntoCallback<Args, R> {
    /// Erases the closure.
    fn into_callback(self) -> Callback;
}

impl IntoCallback<Erased, Erased> for Callback {
    fn into_callback(self) -> Callback {
        self
    }
}

/// Pulls the next argument for a typed callback.
pub(crate) fn next_arg(args: &mut impl Iterator<Item = Value>) -> Result<Value> {
    args.next().ok_or_else(|| Error::Marshal {
        expected: "an argument".to_string(),
        found: "end of argument list".to_string(),
    })
}

impl_into_callback!();
impl_into_callback!(A0 a0);
impl_into_callback!(A0 a0, A1 a1);
impl_into_callback!(A0 a0, A1 a1, A2 a2);
impl_into_callback!(A0 a0, A1 a1, A2 a2, A3 a3);
impl_into_callback!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4);
impl_into_callback!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5);
impl_into_callback!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6);
impl_into_callback!(A0 a0, A1 a1, A2 a2, A3 a3, A4 a4, A5 a5, A6 a6, A7 a7);

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::Completed;

    fn erase<Args, R>(cb: impl IntoCallback<Args, R>) -> Callback {
        cb.into_callback()
    }

    #[test]
    fn test_typed_signature() {
        let cb = erase(|a: i32, b: String| format!("{b}{a}"));

        assert_eq!(cb.parameters(), &[TypeRef::i32(), TypeRef::string()]);
        assert_eq!(cb.return_type(), &TypeRef::string());
        assert!(cb.returns_value());
        assert_eq!(
            cb.invoke(&[Value::I32(1), Value::String("x".into())]).unwrap(),
            Value::String("x1".into())
        );
    }

    #[test]
    fn test_side_effect_callback() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let cb = erase(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!cb.returns_value());
        assert_eq!(cb.invoke(&[]).unwrap(), Value::Void);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_async_callback_type() {
        let cb = erase(|| Completed::new(7_i32));
        assert_eq!(cb.return_type(), &TypeRef::task_of(TypeRef::i32()));
        assert_eq!(
            cb.invoke(&[]).unwrap(),
            Value::Task(Box::new(Value::I32(7)))
        );
    }

    #[test]
    fn test_wrong_argument_shape() {
        let cb = erase(|a: i32| a);
        assert!(matches!(
            cb.invoke(&[Value::Bool(true)]),
            Err(Error::Marshal { .. })
        ));
        assert!(matches!(cb.invoke(&[]), Err(Error::Marshal { .. })));
    }

    #[test]
    fn test_erased_passthrough() {
        let cb = erase(Callback::constant(TypeRef::i32(), Value::I32(4)));
        assert_eq!(cb.invoke(&[]).unwrap(), Value::I32(4));
    }

    #[test]
    fn test_eight_arguments() {
        let cb = erase(
            |a: i32, b: i32, c: i32, d: i32, e: i32, f: i32, g: i32, h: i32| {
                a + b + c + d + e + f + g + h
            },
        );
        let args: Vec<Value> = (1..=8).map(Value::I32).collect();
        assert_eq!(cb.invoke(&args).unwrap(), Value::I32(36));
    }
}
