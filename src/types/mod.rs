//! Type identities and runtime values.
//!
//! Plugs never see real reflection metadata. Instead every member is described with
//! [`TypeRef`] identities supplied by the locator, and every argument or return value
//! crosses the interception boundary as a [`Value`].
//!
//! # Key Components
//!
//! - [`TypeRef`] - Cheap-to-clone identity of a type, with its base type and interfaces
//! - [`TypeFlavor`] - The category of a type (primitive, class, interface, async result, ...)
//! - [`TypeBuilder`] - Builder for user-defined classes, interfaces and value types
//! - [`Value`] - A type-erased runtime value
//! - [`Marshal`] - Conversion between Rust values and [`Value`]
//! - [`Completed`] - A pre-completed asynchronous result
//!
//! # Assignability
//!
//! Signature validation relies on [`TypeRef::is_assignable_from`], which follows the usual
//! managed-runtime rules: identity, `System.Object` accepting everything but `void`, base class
//! chains, implemented interfaces and covariant reference arrays.
//!
//! ```rust
//! use staticplug::types::{TypeBuilder, TypeRef};
//!
//! let shape = TypeBuilder::interface("Geometry", "IShape").build();
//! let circle = TypeBuilder::class("Geometry", "Circle")
//!     .implements(shape.clone())
//!     .build();
//!
//! assert!(shape.is_assignable_from(&circle));
//! assert!(!circle.is_assignable_from(&shape));
//! assert!(TypeRef::object().is_assignable_from(&TypeRef::i32()));
//! ```

mod marshal;
mod value;

pub use marshal::{Completed, Marshal, Reflect};
pub use value::{ObjectRef, Value};

pub(crate) use marshal::marshal_error;

use std::{
    any::Any,
    collections::HashSet,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

/// The category of a [`TypeRef`].
///
/// Mirrors the element types of a CIL signature closely enough to drive signature checks and
/// default-value synthesis.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::IntoStaticStr)]
pub enum TypeFlavor {
    // Base primitive types
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    String,
    Object,

    // Asynchronous results
    /// A completed-or-pending operation without a result
    Task,
    /// A completed-or-pending operation producing a value of the inner type
    GenericTask(TypeRef),

    // Complex types
    /// Single-dimension, zero-based array of the element type
    Array(TypeRef),

    // Type categories
    Class,
    Interface,
    ValueType,
}

impl TypeFlavor {
    /// Check if this is a value type
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            TypeFlavor::Boolean
                | TypeFlavor::Char
                | TypeFlavor::I1
                | TypeFlavor::U1
                | TypeFlavor::I2
                | TypeFlavor::U2
                | TypeFlavor::I4
                | TypeFlavor::U4
                | TypeFlavor::I8
                | TypeFlavor::U8
                | TypeFlavor::R4
                | TypeFlavor::R8
                | TypeFlavor::ValueType
        )
    }

    /// Check if this is a reference type
    #[must_use]
    pub fn is_reference_type(&self) -> bool {
        matches!(
            self,
            TypeFlavor::Object
                | TypeFlavor::String
                | TypeFlavor::Class
                | TypeFlavor::Interface
                | TypeFlavor::Array(_)
                | TypeFlavor::Task
                | TypeFlavor::GenericTask(_)
        )
    }

    /// Check if this is an asynchronous result type
    #[must_use]
    pub fn is_task(&self) -> bool {
        matches!(self, TypeFlavor::Task | TypeFlavor::GenericTask(_))
    }
}

/// Produces the zero value of a user value type from its own [`TypeRef`].
type DefaultFn = Arc<dyn Fn(&TypeRef) -> Value + Send + Sync>;

struct TypeData {
    namespace: String,
    name: String,
    flavor: TypeFlavor,
    base: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    default: Option<DefaultFn>,
}

/// Identity of a type as seen by signature checks.
///
/// `TypeRef` is a reference-counted handle, so cloning is cheap. Equality and hashing are
/// structural over the namespace, the name and the flavor (including generic arguments);
/// the base type and interface list describe the hierarchy but are not part of the identity.
///
/// # Examples
///
/// ```rust
/// use staticplug::types::TypeRef;
///
/// let task = TypeRef::task_of(TypeRef::i32());
/// assert_eq!(task.full_name(), "System.Threading.Tasks.Task<System.Int32>");
/// assert_eq!(task, TypeRef::task_of(TypeRef::i32()));
/// ```
#[derive(Clone)]
pub struct TypeRef(Arc<TypeData>);

impl TypeRef {
    fn system(name: &str, flavor: TypeFlavor) -> Self {
        TypeRef(Arc::new(TypeData {
            namespace: "System".to_string(),
            name: name.to_string(),
            flavor,
            base: None,
            interfaces: Vec::new(),
            default: None,
        }))
    }

    /// `System.Void`
    #[must_use]
    pub fn void() -> Self {
        Self::system("Void", TypeFlavor::Void)
    }

    /// `System.Boolean`
    #[must_use]
    pub fn boolean() -> Self {
        Self::system("Boolean", TypeFlavor::Boolean)
    }

    /// `System.Char`
    #[must_use]
    pub fn char() -> Self {
        Self::system("Char", TypeFlavor::Char)
    }

    /// `System.SByte`
    #[must_use]
    pub fn i8() -> Self {
        Self::system("SByte", TypeFlavor::I1)
    }

    /// `System.Byte`
    #[must_use]
    pub fn u8() -> Self {
        Self::system("Byte", TypeFlavor::U1)
    }

    /// `System.Int16`
    #[must_use]
    pub fn i16() -> Self {
        Self::system("Int16", TypeFlavor::I2)
    }

    /// `System.UInt16`
    #[must_use]
    pub fn u16() -> Self {
        Self::system("UInt16", TypeFlavor::U2)
    }

    /// `System.Int32`
    #[must_use]
    pub fn i32() -> Self {
        Self::system("Int32", TypeFlavor::I4)
    }

    /// `System.UInt32`
    #[must_use]
    pub fn u32() -> Self {
        Self::system("UInt32", TypeFlavor::U4)
    }

    /// `System.Int64`
    #[must_use]
    pub fn i64() -> Self {
        Self::system("Int64", TypeFlavor::I8)
    }

    /// `System.UInt64`
    #[must_use]
    pub fn u64() -> Self {
        Self::system("UInt64", TypeFlavor::U8)
    }

    /// `System.Single`
    #[must_use]
    pub fn f32() -> Self {
        Self::system("Single", TypeFlavor::R4)
    }

    /// `System.Double`
    #[must_use]
    pub fn f64() -> Self {
        Self::system("Double", TypeFlavor::R8)
    }

    /// `System.String`
    #[must_use]
    pub fn string() -> Self {
        Self::system("String", TypeFlavor::String)
    }

    /// `System.Object`
    #[must_use]
    pub fn object() -> Self {
        Self::system("Object", TypeFlavor::Object)
    }

    /// `System.Threading.Tasks.Task`, an asynchronous operation without a result.
    #[must_use]
    pub fn task() -> Self {
        TypeRef(Arc::new(TypeData {
            namespace: "System.Threading.Tasks".to_string(),
            name: "Task".to_string(),
            flavor: TypeFlavor::Task,
            base: None,
            interfaces: Vec::new(),
            default: None,
        }))
    }

    /// `System.Threading.Tasks.Task<T>`, an asynchronous operation producing `inner`.
    #[must_use]
    pub fn task_of(inner: TypeRef) -> Self {
        TypeRef(Arc::new(TypeData {
            namespace: "System.Threading.Tasks".to_string(),
            name: "Task".to_string(),
            flavor: TypeFlavor::GenericTask(inner),
            base: Some(TypeRef::task()),
            interfaces: Vec::new(),
            default: None,
        }))
    }

    /// A single-dimension array of `element`.
    #[must_use]
    pub fn array_of(element: TypeRef) -> Self {
        TypeRef(Arc::new(TypeData {
            namespace: element.namespace().to_string(),
            name: element.name().to_string(),
            flavor: TypeFlavor::Array(element),
            base: None,
            interfaces: Vec::new(),
            default: None,
        }))
    }

    /// Returns the namespace of the type.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.0.namespace
    }

    /// Returns the simple name of the type, without namespace or generic arguments.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns the flavor of the type.
    #[must_use]
    pub fn flavor(&self) -> &TypeFlavor {
        &self.0.flavor
    }

    /// Returns the base type, if any.
    #[must_use]
    pub fn base(&self) -> Option<&TypeRef> {
        self.0.base.as_ref()
    }

    /// Returns the interfaces implemented directly by this type.
    #[must_use]
    pub fn interfaces(&self) -> &[TypeRef] {
        &self.0.interfaces
    }

    /// Returns the zero value registered with [`TypeBuilder::default_instance`], if any.
    #[must_use]
    pub fn default_instance(&self) -> Option<Value> {
        self.0.default.as_ref().map(|make| make(self))
    }

    /// Returns `true` for `System.Void`.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self.0.flavor, TypeFlavor::Void)
    }

    /// Returns the fully qualified name, e.g. `System.Int32` or `System.String[]`.
    #[must_use]
    pub fn full_name(&self) -> String {
        match &self.0.flavor {
            TypeFlavor::GenericTask(inner) => {
                format!("{}.{}<{}>", self.0.namespace, self.0.name, inner.full_name())
            }
            TypeFlavor::Array(element) => format!("{}[]", element.full_name()),
            _ if self.0.namespace.is_empty() => self.0.name.clone(),
            _ => format!("{}.{}", self.0.namespace, self.0.name),
        }
    }

    /// Checks whether a value of type `other` can be used where `self` is expected.
    ///
    /// # Arguments
    ///
    /// * `other` - The type of the value being supplied
    ///
    /// # Returns
    ///
    /// `true` when the types are identical, when `self` is `System.Object` and `other` is not
    /// `void`, when `self` appears in the base chain or interface closure of `other`, or when
    /// both are arrays and the (reference) element types are assignable.
    #[must_use]
    pub fn is_assignable_from(&self, other: &TypeRef) -> bool {
        if self == other {
            return true;
        }
        if self.is_void() || other.is_void() {
            return false;
        }
        if matches!(self.0.flavor, TypeFlavor::Object) {
            return true;
        }
        if let (TypeFlavor::Array(target), TypeFlavor::Array(source)) =
            (&self.0.flavor, &other.0.flavor)
        {
            return source.flavor().is_reference_type() && target.is_assignable_from(source);
        }

        let mut visited = HashSet::new();
        let mut pending: Vec<&TypeRef> = other.supertypes().collect();
        while let Some(candidate) = pending.pop() {
            if candidate == self {
                return true;
            }
            if visited.insert(candidate.clone()) {
                pending.extend(candidate.supertypes());
            }
        }
        false
    }

    fn supertypes(&self) -> impl Iterator<Item = &TypeRef> {
        self.0.base.iter().chain(self.0.interfaces.iter())
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.namespace == other.0.namespace
                && self.0.name == other.0.name
                && self.0.flavor == other.0.flavor)
    }
}

impl Eq for TypeRef {}

impl Hash for TypeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.namespace.hash(state);
        self.0.name.hash(state);
        self.0.flavor.hash(state);
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flavor: &'static str = (&self.0.flavor).into();
        write!(f, "TypeRef({} : {})", self.full_name(), flavor)
    }
}

/// Builder for user-defined types.
///
/// # Examples
///
/// ```rust
/// use staticplug::types::TypeBuilder;
///
/// let base = TypeBuilder::class("App", "Repository").build();
/// let derived = TypeBuilder::class("App", "CachedRepository")
///     .base(base.clone())
///     .build();
///
/// assert!(base.is_assignable_from(&derived));
/// ```
pub struct TypeBuilder {
    namespace: String,
    name: String,
    flavor: TypeFlavor,
    base: Option<TypeRef>,
    interfaces: Vec<TypeRef>,
    default: Option<DefaultFn>,
}

impl TypeBuilder {
    fn new(namespace: impl Into<String>, name: impl Into<String>, flavor: TypeFlavor) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            flavor,
            base: None,
            interfaces: Vec::new(),
            default: None,
        }
    }

    /// Starts a reference type (class).
    #[must_use]
    pub fn class(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeFlavor::Class)
    }

    /// Starts an interface.
    #[must_use]
    pub fn interface(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeFlavor::Interface)
    }

    /// Starts a value type (struct).
    #[must_use]
    pub fn value_type(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, TypeFlavor::ValueType)
    }

    /// Sets the base type.
    #[must_use]
    pub fn base(mut self, base: TypeRef) -> Self {
        self.base = Some(base);
        self
    }

    /// Adds an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: TypeRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Uses `T::default()` as the zero value of this type.
    ///
    /// Default-return plugs hand this instance to callers of members returning the type, where
    /// they would otherwise receive `null`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use staticplug::types::{TypeBuilder, Value};
    ///
    /// #[derive(Default)]
    /// struct Point {
    ///     x: i32,
    /// }
    ///
    /// let point = TypeBuilder::value_type("Geometry", "Point")
    ///     .default_instance::<Point>()
    ///     .build();
    ///
    /// let Value::Object(zero) = Value::default_for(&point) else {
    ///     panic!("expected an object");
    /// };
    /// assert_eq!(zero.downcast::<Point>().map(|p| p.x), Some(0));
    /// ```
    #[must_use]
    pub fn default_instance<T: Default + Any + Send + Sync>(mut self) -> Self {
        self.default = Some(Arc::new(|ty: &TypeRef| {
            Value::Object(ObjectRef::new(ty.clone(), Arc::new(T::default())))
        }));
        self
    }

    /// Finishes the type.
    #[must_use]
    pub fn build(self) -> TypeRef {
        TypeRef(Arc::new(TypeData {
            namespace: self.namespace,
            name: self.name,
            flavor: self.flavor,
            base: self.base,
            interfaces: self.interfaces,
            default: self.default,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        assert_eq!(TypeRef::i32(), TypeRef::i32());
        assert_ne!(TypeRef::i32(), TypeRef::u32());
        assert_eq!(
            TypeRef::task_of(TypeRef::string()),
            TypeRef::task_of(TypeRef::string())
        );
        assert_ne!(TypeRef::task_of(TypeRef::string()), TypeRef::task());
    }

    #[test]
    fn test_full_names() {
        assert_eq!(TypeRef::string().full_name(), "System.String");
        assert_eq!(TypeRef::task().full_name(), "System.Threading.Tasks.Task");
        assert_eq!(TypeRef::array_of(TypeRef::u8()).full_name(), "System.Byte[]");
        assert_eq!(TypeBuilder::class("", "Global").build().full_name(), "Global");
    }

    #[test]
    fn test_assignable_through_interfaces_and_bases() {
        let disposable = TypeBuilder::interface("System", "IDisposable").build();
        let stream = TypeBuilder::class("System.IO", "Stream")
            .implements(disposable.clone())
            .build();
        let file_stream = TypeBuilder::class("System.IO", "FileStream")
            .base(stream.clone())
            .build();

        assert!(disposable.is_assignable_from(&file_stream));
        assert!(stream.is_assignable_from(&file_stream));
        assert!(!file_stream.is_assignable_from(&stream));
        assert!(TypeRef::object().is_assignable_from(&file_stream));
        assert!(!TypeRef::object().is_assignable_from(&TypeRef::void()));
    }

    #[test]
    fn test_array_covariance() {
        let base = TypeBuilder::class("App", "Animal").build();
        let derived = TypeBuilder::class("App", "Cat").base(base.clone()).build();

        assert!(TypeRef::array_of(base.clone()).is_assignable_from(&TypeRef::array_of(derived)));
        assert!(!TypeRef::array_of(TypeRef::i64())
            .is_assignable_from(&TypeRef::array_of(TypeRef::i32())));
    }

    #[test]
    fn test_generic_task_derives_from_task() {
        assert!(TypeRef::task().is_assignable_from(&TypeRef::task_of(TypeRef::i32())));
        assert!(!TypeRef::task_of(TypeRef::i32()).is_assignable_from(&TypeRef::task()));
    }
}
