//! Helper functions and fixtures for unit tests
//!
//! Every test works against its own [`DetourEngine`] and its own fixture types, so tests that
//! run in parallel never share a redirection or a member lock.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crate::{
    engine::{CallSite, DetourEngine, PatchEngine},
    member::MethodDescriptor,
    scope::ScopeOptions,
    types::{TypeBuilder, TypeRef},
};

/// Namespace shared by all fixture types
pub const FIXTURE_NAMESPACE: &str = "StaticPlug.Tests";

// Helper function to create a class in the fixture namespace
pub fn fixture_type(name: &str) -> TypeRef {
    TypeBuilder::class(FIXTURE_NAMESPACE, name).build()
}

// Helper function to create a call site for a static method returning `Int32`
pub fn static_i32_site(ty: &TypeRef, method: &str, engine: &Arc<DetourEngine>) -> CallSite {
    CallSite::with_engine(
        MethodDescriptor::static_method(ty.clone(), method).returns(TypeRef::i32()),
        Arc::clone(engine),
    )
}

// Helper function to create scope options bound to a private engine
pub fn engine_options(engine: &Arc<DetourEngine>) -> ScopeOptions {
    ScopeOptions::default().with_engine(Arc::clone(engine) as Arc<dyn PatchEngine>)
}

/// Counts how often a callback or an original body ran
#[derive(Clone, Default)]
pub struct HitCounter(Arc<AtomicUsize>);

impl HitCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
