//! Integration tests for plugging static properties.

use std::{
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc, LazyLock,
    },
    time::Duration,
};

use staticplug::{prelude::*, Error};

fn settings() -> TypeRef {
    TypeBuilder::class("StaticPlug.Tests", "Settings").build()
}

/// A static property with real backing storage and call sites for both accessors.
struct Field {
    property: PropertyDescriptor,
    get: CallSite,
    set: CallSite,
    storage: AtomicI32,
}

impl Field {
    fn new(name: &str, initial: i32) -> Self {
        let property = PropertyDescriptor::static_property(settings(), name, TypeRef::i32())
            .readable()
            .writable();
        Self {
            get: CallSite::new(property.getter().expect("readable")),
            set: CallSite::new(property.setter().expect("writable")),
            property,
            storage: AtomicI32::new(initial),
        }
    }

    fn get(&self) -> i32 {
        self.get
            .call_static((), || self.storage.load(Ordering::SeqCst))
    }

    fn set(&self, value: i32) {
        self.set
            .call_static((value,), || self.storage.store(value, Ordering::SeqCst));
    }
}

static TIMEOUT: LazyLock<Field> = LazyLock::new(|| Field::new("Timeout", 30));
static RETRIES: LazyLock<Field> = LazyLock::new(|| Field::new("Retries", 3));
static PORT: LazyLock<Field> = LazyLock::new(|| Field::new("Port", 80));
static LEVEL: LazyLock<Field> = LazyLock::new(|| Field::new("Level", 1));
static THRESHOLD: LazyLock<Field> = LazyLock::new(|| Field::new("Threshold", 1));

#[tokio::test]
async fn test_getter_returns_until_released() -> Result<()> {
    assert_eq!(TIMEOUT.get(), 30);

    let plug = PropertyPlug::new(TIMEOUT.property.clone()).returns_value(5)?;
    let mut scope = apply_all(plugs![plug]).await?;
    assert_eq!(TIMEOUT.get(), 5);

    TIMEOUT.set(60);
    assert_eq!(TIMEOUT.get(), 5);

    scope.release()?;
    assert_eq!(TIMEOUT.get(), 60);
    Ok(())
}

#[tokio::test]
async fn test_setter_callback_swallows_writes() -> Result<()> {
    let written = Arc::new(AtomicI32::new(0));
    let sink = Arc::clone(&written);
    let plug = PropertyPlug::new(RETRIES.property.clone())
        .callback(move |value: i32| sink.store(value, Ordering::SeqCst))?;

    let _scope = apply_all(plugs![plug]).await?;
    RETRIES.set(9);

    assert_eq!(written.load(Ordering::SeqCst), 9);
    assert_eq!(RETRIES.get(), 3);
    Ok(())
}

#[tokio::test]
async fn test_call_original_keeps_writes() -> Result<()> {
    let plug = PropertyPlug::new(PORT.property.clone())
        .returns(|| 8080)?
        .call_original(true);

    let _scope = apply_all(plugs![plug]).await?;
    PORT.set(443);
    assert_eq!(PORT.get(), 443);
    Ok(())
}

#[tokio::test]
async fn test_getter_and_method_in_one_batch() -> Result<()> {
    static RESET: LazyLock<CallSite> =
        LazyLock::new(|| CallSite::new(MethodDescriptor::static_method(settings(), "Reset")));

    let property = PropertyPlug::new(LEVEL.property.clone()).returns(|| 9)?;
    let method = MethodPlug::new(RESET.descriptor().clone())?.callback(|| {});

    let scope = apply_all(plugs![property, method]).await?;
    assert_eq!(scope.len(), 2);

    let mut reset_ran = false;
    RESET.call_static((), || reset_ran = true);
    assert!(!reset_ran);
    assert_eq!(LEVEL.get(), 9);

    drop(scope);
    assert_eq!(LEVEL.get(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_accessor_batch_waits_for_property_plug() -> Result<()> {
    let whole = PropertyPlug::new(THRESHOLD.property.clone()).returns(|| 9)?;
    let mut first = apply_all(plugs![whole]).await?;
    assert_eq!(THRESHOLD.get(), 9);

    let getter = THRESHOLD.get.descriptor().clone();
    let waiter = tokio::spawn(async move {
        let accessor = MethodPlug::new(getter)?.returns(|| 5)?;
        let scope = apply_all(plugs![accessor]).await?;
        let observed = THRESHOLD.get();
        drop(scope);
        Ok::<i32, Error>(observed)
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    assert_eq!(first.state(), ScopeState::Active);
    assert_eq!(THRESHOLD.get(), 9);

    first.release()?;
    assert_eq!(waiter.await.expect("task panicked")?, 5);
    assert_eq!(THRESHOLD.get(), 1);
    Ok(())
}

#[test]
fn test_read_only_property_has_no_setter() {
    let property =
        PropertyDescriptor::static_property(settings(), "Version", TypeRef::string()).readable();
    let err = PropertyPlug::new(property)
        .callback(|_: String| {})
        .unwrap_err();

    assert!(matches!(err, Error::MissingSetter(_)));
    assert_eq!(
        err.to_string(),
        "Property 'StaticPlug.Tests.Settings.Version' does not have a setter"
    );
}

#[test]
fn test_resolve_property_by_name() -> Result<()> {
    let info = TypeInfo::new(settings()).with_property(TIMEOUT.property.clone());
    assert_eq!(info.property("Timeout")?.key(), TIMEOUT.property.key());

    let err = info.property(" ").unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    Ok(())
}
