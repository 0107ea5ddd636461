//! Name-based member lookup.

use crate::{
    member::{join_types, MethodDescriptor, PropertyDescriptor},
    types::TypeRef,
    Error, Result,
};

/// The declared members of one type, searchable by name.
///
/// `TypeInfo` stands in for runtime reflection: a test registers the members it wants to plug
/// once, then resolves them by name the way it would with a reflection API.
///
/// # Resolution Rules
///
/// - A name with a single declared method resolves to it regardless of the supplied parameter
///   types.
/// - Overloaded names resolve to the overload whose parameter list equals the supplied one.
/// - [`method`](Self::method) only returns static methods and
///   [`instance_method`](Self::instance_method) only instance methods.
///
/// # Examples
///
/// ```rust
/// use staticplug::{member::{MethodDescriptor, TypeInfo}, types::{TypeBuilder, TypeRef}};
///
/// let ty = TypeBuilder::class("App", "Parser").build();
/// let info = TypeInfo::new(ty.clone())
///     .with_method(MethodDescriptor::static_method(ty.clone(), "Parse").param(TypeRef::string()))
///     .with_method(
///         MethodDescriptor::static_method(ty, "Parse")
///             .param(TypeRef::string())
///             .param(TypeRef::i32()),
///     );
///
/// let parse = info.method("Parse", &[TypeRef::string(), TypeRef::i32()])?;
/// assert_eq!(parse.parameters().len(), 2);
/// # Ok::<(), staticplug::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct TypeInfo {
    ty: TypeRef,
    methods: Vec<MethodDescriptor>,
    properties: Vec<PropertyDescriptor>,
}

impl TypeInfo {
    /// Creates an empty member registry for `ty`.
    #[must_use]
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Declares a method.
    #[must_use]
    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Declares a property.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Returns the described type.
    #[must_use]
    pub fn type_ref(&self) -> &TypeRef {
        &self.ty
    }

    /// Resolves a static method.
    ///
    /// # Arguments
    ///
    /// * `name` - The method name
    /// * `parameters` - Parameter types used to pick between overloads
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if `name` is empty or whitespace
    /// - [`Error::MissingMember`] if no method has that name
    /// - [`Error::AmbiguousMember`] if no overload matches `parameters`
    /// - [`Error::StaticMismatch`] if the method is an instance method
    pub fn method(&self, name: &str, parameters: &[TypeRef]) -> Result<MethodDescriptor> {
        let method = self.find_method(name, parameters)?;
        if !method.is_static() {
            return Err(Error::StaticMismatch(format!(
                "'{name}' on '{}' is not static. Use TypeInfo::instance_method to plug it.",
                self.ty.full_name()
            )));
        }
        Ok(method.clone())
    }

    /// Resolves an instance method.
    ///
    /// # Errors
    ///
    /// As [`method`](Self::method), with [`Error::StaticMismatch`] raised for static methods.
    pub fn instance_method(&self, name: &str, parameters: &[TypeRef]) -> Result<MethodDescriptor> {
        let method = self.find_method(name, parameters)?;
        if method.is_static() {
            return Err(Error::StaticMismatch(format!(
                "'{name}' on '{}' is static. Use TypeInfo::method to plug it.",
                self.ty.full_name()
            )));
        }
        Ok(method.clone())
    }

    /// Resolves a property.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if `name` is empty or whitespace
    /// - [`Error::MissingMember`] if no property has that name
    pub fn property(&self, name: &str) -> Result<PropertyDescriptor> {
        if name.trim().is_empty() {
            return Err(config_error!("'name' cannot be null or whitespace."));
        }

        self.properties
            .iter()
            .find(|p| p.name() == name)
            .cloned()
            .ok_or_else(|| Error::MissingMember {
                kind: "property",
                name: name.to_string(),
                declaring_type: self.ty.full_name(),
            })
    }

    fn find_method(&self, name: &str, parameters: &[TypeRef]) -> Result<&MethodDescriptor> {
        if name.trim().is_empty() {
            return Err(config_error!("'methodName' cannot be null or whitespace."));
        }

        let candidates: Vec<&MethodDescriptor> =
            self.methods.iter().filter(|m| m.name() == name).collect();

        match candidates.as_slice() {
            [] => Err(Error::MissingMember {
                kind: "method",
                name: name.to_string(),
                declaring_type: self.ty.full_name(),
            }),
            [single] => Ok(single),
            overloads => overloads
                .iter()
                .copied()
                .find(|m| m.parameters() == parameters)
                .ok_or_else(|| Error::AmbiguousMember {
                    name: name.to_string(),
                    declaring_type: self.ty.full_name(),
                    parameters: join_types(parameters),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeBuilder;

    fn info() -> TypeInfo {
        let ty = TypeBuilder::class("StaticPlug.Tests", "Catalog").build();
        TypeInfo::new(ty.clone())
            .with_method(MethodDescriptor::static_method(ty.clone(), "Lookup").param(TypeRef::i32()))
            .with_method(
                MethodDescriptor::static_method(ty.clone(), "Lookup").param(TypeRef::string()),
            )
            .with_method(MethodDescriptor::static_method(ty.clone(), "Single").param(TypeRef::i32()))
            .with_method(MethodDescriptor::instance_method(ty.clone(), "Refresh"))
            .with_property(
                PropertyDescriptor::static_property(ty, "Size", TypeRef::i32()).readable(),
            )
    }

    #[test]
    fn test_overload_resolution() {
        let found = info().method("Lookup", &[TypeRef::string()]).unwrap();
        assert_eq!(found.parameters(), &[TypeRef::string()]);
    }

    #[test]
    fn test_single_method_ignores_parameters() {
        let found = info().method("Single", &[]).unwrap();
        assert_eq!(found.parameters(), &[TypeRef::i32()]);
    }

    #[test]
    fn test_missing_method() {
        let err = info().method("Nope", &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not find method 'Nope' on 'StaticPlug.Tests.Catalog'"
        );
    }

    #[test]
    fn test_ambiguous_method() {
        let err = info().method("Lookup", &[TypeRef::f64()]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not find method 'Lookup' on 'StaticPlug.Tests.Catalog' with parameter type(s) System.Double"
        );
    }

    #[test]
    fn test_static_mismatch() {
        let err = info().instance_method("Single", &[]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'Single' on 'StaticPlug.Tests.Catalog' is static. Use TypeInfo::method to plug it."
        );
        assert!(matches!(
            info().method("Refresh", &[]),
            Err(Error::StaticMismatch(_))
        ));
        assert!(info().instance_method("Refresh", &[]).is_ok());
    }

    #[test]
    fn test_blank_names_are_rejected() {
        assert!(matches!(info().method("  ", &[]), Err(Error::Configuration(_))));
        assert!(matches!(info().property(""), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_property_lookup() {
        assert!(info().property("Size").unwrap().can_read());
        assert!(matches!(
            info().property("Missing"),
            Err(Error::MissingMember { kind: "property", .. })
        ));
    }
}
