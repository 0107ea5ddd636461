//! Integration tests for plugging non-virtual instance members.

use std::sync::{Arc, LazyLock, Mutex};

use staticplug::prelude::*;

struct Repository {
    name: String,
}

impl Reflect for Repository {
    fn type_ref() -> TypeRef {
        TypeBuilder::class("StaticPlug.Tests", "Repository").build()
    }
}

impl Repository {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
        })
    }
}

fn method(name: &str) -> MethodDescriptor {
    MethodDescriptor::instance_method(Repository::type_ref(), name)
}

static COUNT: LazyLock<CallSite> =
    LazyLock::new(|| CallSite::new(method("Count").returns(TypeRef::i32())));
static FIND: LazyLock<CallSite> = LazyLock::new(|| {
    CallSite::new(
        method("Find")
            .param(TypeRef::i32())
            .returns(TypeRef::string()),
    )
});
static SAVE: LazyLock<CallSite> =
    LazyLock::new(|| CallSite::new(method("Save").param(TypeRef::string())));
static ADD: LazyLock<CallSite> = LazyLock::new(|| {
    CallSite::new(method("Add").param(TypeRef::i32()).returns(TypeRef::i32()))
});
static NAME_PROPERTY: LazyLock<PropertyDescriptor> = LazyLock::new(|| {
    PropertyDescriptor::instance_property(Repository::type_ref(), "Name", TypeRef::string())
        .readable()
});

#[tokio::test]
async fn test_callback_receives_receiver() -> Result<()> {
    let plug = MethodPlug::instance(COUNT.descriptor().clone())?
        .returns(|repo: Arc<Repository>| repo.name.len() as i32)?;

    let _scope = apply_all(plugs![plug]).await?;
    let repo = Repository::new("orders");
    assert_eq!(COUNT.call_instance(&repo, (), || 0), 6);
    Ok(())
}

#[tokio::test]
async fn test_callback_without_receiver() -> Result<()> {
    let plug = MethodPlug::instance(FIND.descriptor().clone())?
        .returns(|id: i32| format!("item-{id}"))?;

    let _scope = apply_all(plugs![plug]).await?;
    let repo = Repository::new("items");
    let found: String = FIND.call_instance(&repo, (7,), || "original".to_string());
    assert_eq!(found, "item-7");
    Ok(())
}

#[tokio::test]
async fn test_void_instance_method() -> Result<()> {
    let saved = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&saved);
    let plug = MethodPlug::instance(SAVE.descriptor().clone())?.callback(
        move |repo: Arc<Repository>, value: String| {
            sink.lock().unwrap().push(format!("{}:{value}", repo.name));
        },
    );

    let _scope = apply_all(plugs![plug]).await?;
    let repo = Repository::new("users");
    let mut original_ran = false;
    SAVE.call_instance(&repo, ("alice".to_string(),), || original_ran = true);

    assert!(!original_ran);
    assert_eq!(*saved.lock().unwrap(), vec!["users:alice".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_receiver_type_mismatch() -> Result<()> {
    let plug = MethodPlug::instance(ADD.descriptor().clone())?
        .returns(|_: String, value: i32| value)?;

    let err = apply_all(plugs![plug]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Plug for StaticPlug.Tests.Repository.Add has parameters (System.String, System.Int32) \
         that do not match original method parameters (StaticPlug.Tests.Repository this, System.Int32)"
    );
    assert!(!ADD.key().is_locked());
    Ok(())
}

#[tokio::test]
async fn test_instance_property_getter() -> Result<()> {
    let getter = CallSite::new(NAME_PROPERTY.getter().expect("readable property"));
    let plug = PropertyPlug::new(NAME_PROPERTY.clone())
        .returns(|repo: Arc<Repository>| repo.name.to_uppercase())?;

    let repo = Repository::new("archive");
    {
        let _scope = apply_all(plugs![plug]).await?;
        let name: String = getter.call_instance(&repo, (), || repo.name.clone());
        assert_eq!(name, "ARCHIVE");
    }

    let name: String = getter.call_instance(&repo, (), || repo.name.clone());
    assert_eq!(name, "archive");
    Ok(())
}

#[test]
fn test_static_method_through_instance_api() {
    let descriptor = MethodDescriptor::static_method(Repository::type_ref(), "Open");
    let err = MethodPlug::instance(descriptor).unwrap_err();
    assert_eq!(
        err.to_string(),
        "'Open' on 'StaticPlug.Tests.Repository' is static. Use MethodPlug::new to plug it."
    );
}
