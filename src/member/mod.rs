//! Member descriptors and canonical member identities.
//!
//! This module describes *what* can be plugged. A member is described once by the locator
//! layer and then only ever referred to through its descriptor and its interned key.
//!
//! # Key Components
//!
//! - [`MethodDescriptor`] - A resolved method: declaring type, name, parameters, return type
//! - [`PropertyDescriptor`] - A resolved property, with its accessors
//! - [`MemberFlags`] - Static/virtual/abstract modifiers and property accessibility
//! - [`MemberKey`] - The interned identity used for dispatch lookup and mutual exclusion
//! - [`TypeInfo`] - Name-based lookup of declared members
//!
//! # Accessors
//!
//! Properties are plugged through their accessor methods. A property `Count` of type `int`
//! exposes a getter `get_Count() -> int` and a setter `set_Count(int) -> void`, each with its
//! own [`MemberKey`] for dispatch. The property itself has a key as well; that one serves as
//! the lock shared by both accessors.

mod key;
mod locator;

pub use key::{KeyGuard, MemberIdentity, MemberKey};
pub use locator::TypeInfo;

use std::fmt;

use bitflags::bitflags;

use crate::types::TypeRef;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Modifiers of a member
    pub struct MemberFlags: u32 {
        /// Member belongs to the type rather than to an instance
        const STATIC = 0x0001;
        /// Member is dispatched through the vtable
        const VIRTUAL = 0x0002;
        /// Member has no implementation
        const ABSTRACT = 0x0004;
        /// Property has a getter
        const READABLE = 0x0010;
        /// Property has a setter
        const WRITABLE = 0x0020;
    }
}

/// A resolved method.
///
/// Descriptors are plain data handed over by the locator. They are cheap to clone and carry
/// everything the interception core needs: the identity fields of the [`MemberKey`] plus the
/// static/instance distinction used for receiver handling.
///
/// # Examples
///
/// ```rust
/// use staticplug::{member::MethodDescriptor, types::{TypeBuilder, TypeRef}};
///
/// let clock = TypeBuilder::class("App", "Clock").build();
/// let now = MethodDescriptor::static_method(clock, "Ticks").returns(TypeRef::i64());
///
/// assert_eq!(now.full_name(), "App.Clock.Ticks");
/// assert!(now.is_static());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: String,
    declaring_type: TypeRef,
    parameters: Vec<TypeRef>,
    return_type: TypeRef,
    flags: MemberFlags,
}

impl MethodDescriptor {
    fn new(declaring_type: TypeRef, name: impl Into<String>, flags: MemberFlags) -> Self {
        Self {
            name: name.into(),
            declaring_type,
            parameters: Vec::new(),
            return_type: TypeRef::void(),
            flags,
        }
    }

    /// Describes a static method returning `void` with no parameters.
    #[must_use]
    pub fn static_method(declaring_type: TypeRef, name: impl Into<String>) -> Self {
        Self::new(declaring_type, name, MemberFlags::STATIC)
    }

    /// Describes an instance method returning `void` with no parameters.
    #[must_use]
    pub fn instance_method(declaring_type: TypeRef, name: impl Into<String>) -> Self {
        Self::new(declaring_type, name, MemberFlags::empty())
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, ty: TypeRef) -> Self {
        self.parameters.push(ty);
        self
    }

    /// Replaces the parameter list.
    #[must_use]
    pub fn params(mut self, params: impl IntoIterator<Item = TypeRef>) -> Self {
        self.parameters = params.into_iter().collect();
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    /// Adds modifier flags.
    #[must_use]
    pub fn with_flags(mut self, flags: MemberFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Returns the method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declaring type.
    #[must_use]
    pub fn declaring_type(&self) -> &TypeRef {
        &self.declaring_type
    }

    /// Returns the declared parameter types, excluding any receiver.
    #[must_use]
    pub fn parameters(&self) -> &[TypeRef] {
        &self.parameters
    }

    /// Returns the return type (`System.Void` for methods without a result).
    #[must_use]
    pub fn return_type(&self) -> &TypeRef {
        &self.return_type
    }

    /// Returns the modifier flags.
    #[must_use]
    pub fn flags(&self) -> MemberFlags {
        self.flags
    }

    /// Returns `true` for static methods.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    /// Returns `true` if the method produces a value.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        !self.return_type.is_void()
    }

    /// Returns `Namespace.Type.Method`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring_type.full_name(), self.name)
    }

    /// Returns the canonical key for this method.
    #[must_use]
    pub fn key(&self) -> MemberKey {
        MemberKey::for_method(self)
    }
}

impl fmt::Display for MethodDescriptor {
    /// Renders `static System.Int32 App.Clock::Ticks(System.String)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static() {
            f.write_str("static ")?;
        }
        if self.flags.contains(MemberFlags::ABSTRACT) {
            f.write_str("abstract ")?;
        }
        if self.flags.contains(MemberFlags::VIRTUAL) {
            f.write_str("virtual ")?;
        }
        write!(
            f,
            "{} {}::{}({})",
            self.return_type,
            self.declaring_type,
            self.name,
            join_types(&self.parameters)
        )
    }
}

/// A resolved property.
///
/// # Examples
///
/// ```rust
/// use staticplug::{member::PropertyDescriptor, types::{TypeBuilder, TypeRef}};
///
/// let settings = TypeBuilder::class("App", "Settings").build();
/// let timeout = PropertyDescriptor::static_property(settings, "Timeout", TypeRef::i32())
///     .readable()
///     .writable();
///
/// assert_eq!(timeout.getter().unwrap().name(), "get_Timeout");
/// assert_eq!(timeout.setter().unwrap().parameters(), &[TypeRef::i32()]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyDescriptor {
    name: String,
    declaring_type: TypeRef,
    property_type: TypeRef,
    flags: MemberFlags,
}

impl PropertyDescriptor {
    /// Describes a static property without accessors; add them with
    /// [`readable`](Self::readable) and [`writable`](Self::writable).
    #[must_use]
    pub fn static_property(
        declaring_type: TypeRef,
        name: impl Into<String>,
        property_type: TypeRef,
    ) -> Self {
        Self {
            name: name.into(),
            declaring_type,
            property_type,
            flags: MemberFlags::STATIC,
        }
    }

    /// Describes an instance property without accessors.
    #[must_use]
    pub fn instance_property(
        declaring_type: TypeRef,
        name: impl Into<String>,
        property_type: TypeRef,
    ) -> Self {
        Self {
            name: name.into(),
            declaring_type,
            property_type,
            flags: MemberFlags::empty(),
        }
    }

    /// Marks the property as having a getter.
    #[must_use]
    pub fn readable(mut self) -> Self {
        self.flags |= MemberFlags::READABLE;
        self
    }

    /// Marks the property as having a setter.
    #[must_use]
    pub fn writable(mut self) -> Self {
        self.flags |= MemberFlags::WRITABLE;
        self
    }

    /// Returns the property name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declaring type.
    #[must_use]
    pub fn declaring_type(&self) -> &TypeRef {
        &self.declaring_type
    }

    /// Returns the property type.
    #[must_use]
    pub fn property_type(&self) -> &TypeRef {
        &self.property_type
    }

    /// Returns `true` for static properties.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(MemberFlags::STATIC)
    }

    /// Returns `true` if the property has a getter.
    #[must_use]
    pub fn can_read(&self) -> bool {
        self.flags.contains(MemberFlags::READABLE)
    }

    /// Returns `true` if the property has a setter.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.flags.contains(MemberFlags::WRITABLE)
    }

    fn accessor_flags(&self) -> MemberFlags {
        self.flags & MemberFlags::STATIC
    }

    /// Returns the getter `get_<Name>() -> <Type>`, if the property is readable.
    #[must_use]
    pub fn getter(&self) -> Option<MethodDescriptor> {
        self.can_read().then(|| {
            MethodDescriptor::new(
                self.declaring_type.clone(),
                format!("get_{}", self.name),
                self.accessor_flags(),
            )
            .returns(self.property_type.clone())
        })
    }

    /// Returns the setter `set_<Name>(<Type>) -> void`, if the property is writable.
    #[must_use]
    pub fn setter(&self) -> Option<MethodDescriptor> {
        self.can_write().then(|| {
            MethodDescriptor::new(
                self.declaring_type.clone(),
                format!("set_{}", self.name),
                self.accessor_flags(),
            )
            .param(self.property_type.clone())
        })
    }

    /// Returns `Namespace.Type.Property`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.declaring_type.full_name(), self.name)
    }

    /// Returns the canonical key for the property as a whole.
    #[must_use]
    pub fn key(&self) -> MemberKey {
        MemberKey::for_property(self)
    }
}

impl fmt::Display for PropertyDescriptor {
    /// Renders `static System.Int32 App.Settings::Timeout`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static() {
            f.write_str("static ")?;
        }
        write!(
            f,
            "{} {}::{}",
            self.property_type, self.declaring_type, self.name
        )
    }
}

/// Joins type names with `", "`.
pub(crate) fn join_types<'a>(types: impl IntoIterator<Item = &'a TypeRef>) -> String {
    types
        .into_iter()
        .map(TypeRef::full_name)
        .collect::<Vec<_>>()
        .join(", ")
}
