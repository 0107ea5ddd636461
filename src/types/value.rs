//! Runtime value representation for intercepted calls.

use std::{any::Any, fmt, sync::Arc};

use crate::types::{TypeFlavor, TypeRef};

/// Type-erased runtime value.
///
/// `Value` is what travels through the interception boundary: arguments are handed to the
/// trampoline as `Value`s, callbacks receive and return them, and the patch engine converts the
/// result back for the caller. Typed code never builds these by hand; [`crate::types::Marshal`]
/// does the conversion.
///
/// # Type Mapping
///
/// | Type | Variant |
/// |------|---------|
/// | `void` | [`Value::Void`] |
/// | `null` reference | [`Value::Null`] |
/// | `bool` | [`Value::Bool`] |
/// | `char` | [`Value::Char`] |
/// | `int8`, `uint8`, `int16`, `uint16`, `int32`, `uint32` | [`Value::I32`] (bit pattern preserved) |
/// | `int64`, `uint64` | [`Value::I64`] (bit pattern preserved) |
/// | `float32` | [`Value::F32`] |
/// | `float64` | [`Value::F64`] |
/// | `string` | [`Value::String`] |
/// | arrays | [`Value::Array`] |
/// | `Task`, `Task<T>` | [`Value::Task`] (always completed) |
/// | any other object | [`Value::Object`] |
#[derive(Clone, Debug)]
pub enum Value {
    /// No value (void return).
    Void,

    /// A null reference.
    Null,

    /// Boolean value.
    Bool(bool),

    /// UTF-16 code unit, represented as a Rust `char`.
    Char(char),

    /// 32-bit integer, also used for the narrower integer types.
    I32(i32),

    /// 64-bit integer.
    I64(i64),

    /// 32-bit floating point.
    F32(f32),

    /// 64-bit floating point.
    F64(f64),

    /// Immutable string.
    String(String),

    /// Single-dimension array.
    Array(Vec<Value>),

    /// A completed asynchronous result.
    ///
    /// Non-generic tasks carry [`Value::Void`].
    Task(Box<Value>),

    /// Reference to a user object.
    Object(ObjectRef),
}

impl Value {
    /// Synthesizes the default value of `ty`.
    ///
    /// This backs the default-return behavior used when a plug only supplies a side-effect
    /// callback for a member that returns a value:
    ///
    /// - numeric types produce zero, `bool` produces `false`, `char` produces `'\0'`
    /// - reference types produce [`Value::Null`]
    /// - user value types produce the instance registered with
    ///   [`TypeBuilder::default_instance`](crate::types::TypeBuilder::default_instance), or
    ///   [`Value::Null`] when none was registered
    /// - `Task` produces a completed task, `Task<T>` a completed task wrapping the default of `T`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use staticplug::types::{TypeRef, Value};
    ///
    /// let value = Value::default_for(&TypeRef::task_of(TypeRef::i32()));
    /// assert_eq!(value, Value::Task(Box::new(Value::I32(0))));
    /// ```
    #[must_use]
    pub fn default_for(ty: &TypeRef) -> Value {
        match ty.flavor() {
            TypeFlavor::Void => Value::Void,
            TypeFlavor::Boolean => Value::Bool(false),
            TypeFlavor::Char => Value::Char('\0'),
            TypeFlavor::I1
            | TypeFlavor::U1
            | TypeFlavor::I2
            | TypeFlavor::U2
            | TypeFlavor::I4
            | TypeFlavor::U4 => Value::I32(0),
            TypeFlavor::I8 | TypeFlavor::U8 => Value::I64(0),
            TypeFlavor::R4 => Value::F32(0.0),
            TypeFlavor::R8 => Value::F64(0.0),
            TypeFlavor::Task => Value::Task(Box::new(Value::Void)),
            TypeFlavor::GenericTask(inner) => Value::Task(Box::new(Value::default_for(inner))),
            TypeFlavor::String
            | TypeFlavor::Object
            | TypeFlavor::Array(_)
            | TypeFlavor::Class
            | TypeFlavor::Interface => Value::Null,
            TypeFlavor::ValueType => ty.default_instance().unwrap_or(Value::Null),
        }
    }

    /// Returns a short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Void => "void",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::I32(_) => "int32",
            Value::I64(_) => "int64",
            Value::F32(_) => "float32",
            Value::F64(_) => "float64",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Task(_) => "task",
            Value::Object(_) => "object",
        }
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Task(a), Value::Task(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(v) => write!(f, "'{v}'"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}L"),
            Value::F32(v) => write!(f, "{v}f"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "\"{v}\""),
            Value::Array(items) => write!(f, "array[{}]", items.len()),
            Value::Task(inner) => write!(f, "task({inner})"),
            Value::Object(obj) => write!(f, "{}", obj.type_ref()),
        }
    }
}

/// Reference to a user object crossing the interception boundary.
///
/// Objects are shared, not copied: the receiver of an instance call and any object arguments
/// are handed to callbacks as the same allocation the caller holds.
#[derive(Clone)]
pub struct ObjectRef {
    ty: TypeRef,
    inner: Arc<dyn Any + Send + Sync>,
}

impl ObjectRef {
    /// Wraps a shared object together with its runtime type.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(ty: TypeRef, inner: Arc<T>) -> Self {
        Self { ty, inner }
    }

    /// Returns the runtime type of the object.
    #[must_use]
    pub fn type_ref(&self) -> &TypeRef {
        &self.ty
    }

    /// Attempts to recover the concrete object.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Returns `true` if both references point to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("type", &self.ty.full_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeBuilder;

    #[test]
    fn test_default_for_primitives() {
        assert_eq!(Value::default_for(&TypeRef::i32()), Value::I32(0));
        assert_eq!(Value::default_for(&TypeRef::u64()), Value::I64(0));
        assert_eq!(Value::default_for(&TypeRef::boolean()), Value::Bool(false));
        assert_eq!(Value::default_for(&TypeRef::f64()), Value::F64(0.0));
        assert_eq!(Value::default_for(&TypeRef::void()), Value::Void);
    }

    #[test]
    fn test_default_for_references() {
        assert!(Value::default_for(&TypeRef::string()).is_null());
        assert!(Value::default_for(&TypeBuilder::class("App", "Service").build()).is_null());
        assert!(Value::default_for(&TypeRef::array_of(TypeRef::i32())).is_null());
    }

    #[test]
    fn test_default_for_tasks_unwraps_one_layer() {
        assert_eq!(
            Value::default_for(&TypeRef::task()),
            Value::Task(Box::new(Value::Void))
        );
        assert_eq!(
            Value::default_for(&TypeRef::task_of(TypeRef::string())),
            Value::Task(Box::new(Value::Null))
        );
        assert_eq!(
            Value::default_for(&TypeRef::task_of(TypeRef::task_of(TypeRef::i32()))),
            Value::Task(Box::new(Value::Task(Box::new(Value::I32(0)))))
        );
    }

    #[test]
    fn test_default_for_value_type_uses_registered_instance() {
        #[derive(Default)]
        struct Extent {
            width: u32,
            height: u32,
        }

        let extent = TypeBuilder::value_type("App", "Extent")
            .default_instance::<Extent>()
            .build();
        let Value::Object(zero) = Value::default_for(&extent) else {
            panic!("expected an object");
        };
        assert_eq!(zero.type_ref(), &extent);
        let zero = zero.downcast::<Extent>().unwrap();
        assert_eq!((zero.width, zero.height), (0, 0));

        let plain = TypeBuilder::value_type("App", "Opaque").build();
        assert!(Value::default_for(&plain).is_null());
    }

    #[test]
    fn test_object_identity() {
        let ty = TypeBuilder::class("App", "Widget").build();
        let shared = Arc::new(5_u32);
        let a = ObjectRef::new(ty.clone(), Arc::clone(&shared));
        let b = ObjectRef::new(ty.clone(), shared);
        let c = ObjectRef::new(ty, Arc::new(5_u32));

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.downcast::<u32>().as_deref(), Some(&5));
        assert!(a.downcast::<i64>().is_none());
    }
}
