use std::{fmt, sync::Arc};

use crate::{
    engine::PatchEngine,
    intercept::{ActionHandler, Callback, FuncHandler, Handler, IntoCallback},
    member::{KeyGuard, MemberKey, MethodDescriptor, PropertyDescriptor},
    plug::{sealed::Lifecycle, Plug, PlugCore},
    types::Marshal,
    Error, Result,
};

/// Replacement behavior for one property.
///
/// The getter and setter are redirected independently: configuring only
/// [`returns`](Self::returns) leaves the setter untouched and configuring only
/// [`callback`](Self::callback) leaves the getter untouched. The plug locks the property and both
/// accessors, so a concurrent batch plugging an accessor directly waits for it.
///
/// # Examples
///
/// ```rust,ignore
/// use staticplug::{apply_all, plugs, PropertyPlug};
///
/// let plug = PropertyPlug::new(timeout_descriptor())
///     .returns(|| 5)?
///     .callback(|value: i32| println!("timeout set to {value}"))?;
///
/// let _scope = apply_all(plugs![plug]).await?;
/// ```
pub struct PropertyPlug {
    core: PlugCore,
    property: PropertyDescriptor,
    getter: Option<Arc<dyn Handler>>,
    setter: Option<Arc<dyn Handler>>,
    call_original: bool,
}

impl PropertyPlug {
    /// Creates a plug for a static or instance property.
    #[must_use]
    pub fn new(property: PropertyDescriptor) -> Self {
        let accessors = [property.getter(), property.setter()];
        let core = PlugCore::new(format!("staticplug.{property}"), property.key())
            .with_keys(accessors.iter().flatten().map(MethodDescriptor::key));
        Self {
            core,
            property,
            getter: None,
            setter: None,
            call_original: false,
        }
    }

    /// Returns the plugged property.
    #[must_use]
    pub fn property(&self) -> &PropertyDescriptor {
        &self.property
    }

    /// Makes the getter return whatever `callback` returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingGetter`] if the property is write-only.
    pub fn returns<Args, R>(mut self, callback: impl IntoCallback<Args, R>) -> Result<Self> {
        let getter = self
            .property
            .getter()
            .ok_or_else(|| Error::MissingGetter(self.property.full_name()))?;
        self.getter = Some(Arc::new(FuncHandler::new(&getter, callback.into_callback())));
        Ok(self)
    }

    /// Makes the getter return `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingGetter`] if the property is write-only.
    pub fn returns_value<T: Marshal>(self, value: T) -> Result<Self> {
        let callback = Callback::constant(T::type_ref(), value.into_value());
        self.returns(callback)
    }

    /// Runs `callback` instead of the setter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingSetter`] if the property is read-only.
    pub fn callback<Args, R>(mut self, callback: impl IntoCallback<Args, R>) -> Result<Self> {
        let setter = self
            .property
            .setter()
            .ok_or_else(|| Error::MissingSetter(self.property.full_name()))?;
        self.setter = Some(Arc::new(ActionHandler::new(&setter, callback.into_callback())));
        Ok(self)
    }

    /// Also runs the original accessors after the configured callbacks.
    ///
    /// The original getter's value is what the caller observes. An accessor without a callback
    /// is not redirected at all, so it keeps running the original.
    #[must_use]
    pub fn call_original(mut self, call_original: bool) -> Self {
        self.call_original = call_original;
        self
    }
}

impl Plug for PropertyPlug {
    fn id(&self) -> &str {
        self.core.id()
    }

    fn key(&self) -> &MemberKey {
        self.core.key()
    }

    fn keys(&self) -> &[MemberKey] {
        self.core.keys()
    }

    fn is_applied(&self) -> bool {
        self.core.is_applied()
    }
}

impl Lifecycle for PropertyPlug {
    fn hold(&mut self, guard: KeyGuard) {
        self.core.hold(guard);
    }

    fn apply(&mut self, engine: &Arc<dyn PatchEngine>) -> Result<()> {
        if self.core.is_applied() {
            return Ok(());
        }

        if let (Some(handler), Some(getter)) = (&self.getter, self.property.getter()) {
            self.core
                .patch(engine, &getter, handler, self.call_original)?;
        }
        if let (Some(handler), Some(setter)) = (&self.setter, self.property.setter()) {
            self.core
                .patch(engine, &setter, handler, self.call_original)?;
        }

        self.core.mark_applied();
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.core.release()
    }
}

impl fmt::Debug for PropertyPlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyPlug")
            .field("id", &self.core.id())
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("call_original", &self.call_original)
            .field("applied", &self.core.is_applied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        engine::{CallSite, DetourEngine},
        types::{TypeBuilder, TypeRef},
    };

    fn host() -> TypeRef {
        TypeBuilder::class("StaticPlug.Tests.PropertyPlug", "Host").build()
    }

    fn sites(property: &PropertyDescriptor, engine: &Arc<DetourEngine>) -> (CallSite, CallSite) {
        (
            CallSite::with_engine(property.getter().unwrap(), Arc::clone(engine)),
            CallSite::with_engine(property.setter().unwrap(), Arc::clone(engine)),
        )
    }

    fn apply(mut plug: PropertyPlug, engine: &Arc<DetourEngine>) -> PropertyPlug {
        let erased: Arc<dyn PatchEngine> = Arc::clone(engine) as Arc<dyn PatchEngine>;
        for key in plug.keys().to_vec() {
            plug.hold(key.blocking_lock());
        }
        plug.apply(&erased).unwrap();
        plug
    }

    #[test]
    fn test_missing_accessors() {
        let read_only = PropertyDescriptor::static_property(host(), "ReadOnly", TypeRef::i32())
            .readable();
        let err = PropertyPlug::new(read_only).callback(|_: i32| {}).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Property 'StaticPlug.Tests.PropertyPlug.Host.ReadOnly' does not have a setter"
        );

        let write_only = PropertyDescriptor::static_property(host(), "WriteOnly", TypeRef::i32())
            .writable();
        let err = PropertyPlug::new(write_only).returns(|| 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Property 'StaticPlug.Tests.PropertyPlug.Host.WriteOnly' does not have a getter"
        );
    }

    #[test]
    fn test_getter_only_leaves_setter() {
        let engine = Arc::new(DetourEngine::new());
        let property = PropertyDescriptor::static_property(host(), "GetterOnly", TypeRef::i32())
            .readable()
            .writable();
        let (get, set) = sites(&property, &engine);

        let mut plug = apply(PropertyPlug::new(property).returns(|| 7).unwrap(), &engine);

        assert_eq!(get.call_static((), || 1), 7);
        assert!(!engine.is_patched(set.key()));

        plug.release().unwrap();
        assert!(!engine.is_patched(get.key()));
    }

    #[test]
    fn test_setter_callback_receives_value() {
        let engine = Arc::new(DetourEngine::new());
        let property = PropertyDescriptor::static_property(host(), "Setter", TypeRef::string())
            .readable()
            .writable();
        let (get, set) = sites(&property, &engine);
        let written = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&written);

        let _plug = apply(
            PropertyPlug::new(property)
                .callback(move |value: String| sink.lock().unwrap().push(value))
                .unwrap(),
            &engine,
        );

        let mut original_ran = false;
        set.call_static(("hello".to_string(),), || original_ran = true);
        assert!(!original_ran);
        assert_eq!(*written.lock().unwrap(), vec!["hello".to_string()]);
        assert!(!engine.is_patched(get.key()));
    }

    #[test]
    fn test_call_original_runs_setter() {
        let engine = Arc::new(DetourEngine::new());
        let property = PropertyDescriptor::static_property(host(), "PassThrough", TypeRef::i32())
            .readable()
            .writable();
        let (get, set) = sites(&property, &engine);

        let _plug = apply(
            PropertyPlug::new(property)
                .returns(|| 7)
                .unwrap()
                .call_original(true),
            &engine,
        );

        assert_eq!(get.call_static((), || 1), 1);
        assert!(!engine.is_patched(set.key()));
        let mut original_ran = false;
        set.call_static((3,), || original_ran = true);
        assert!(original_ran);
    }

    #[test]
    fn test_call_original_toggled_off() {
        let engine = Arc::new(DetourEngine::new());
        let property = PropertyDescriptor::static_property(host(), "Toggled", TypeRef::i32())
            .readable()
            .writable();
        let (get, set) = sites(&property, &engine);

        let _plug = apply(
            PropertyPlug::new(property)
                .returns(|| 7)
                .unwrap()
                .call_original(true)
                .call_original(false),
            &engine,
        );

        assert_eq!(get.call_static((), || 1), 7);
        assert!(!engine.is_patched(set.key()));
    }

    #[test]
    fn test_locks_property_and_accessors() {
        let property = PropertyDescriptor::static_property(host(), "Locked", TypeRef::i32())
            .readable()
            .writable();
        let getter = property.getter().unwrap().key();
        let setter = property.setter().unwrap().key();

        let plug = PropertyPlug::new(property.clone());
        assert_eq!(plug.key(), &property.key());
        assert_eq!(plug.keys(), &[property.key(), getter, setter]);

        let read_only = PropertyDescriptor::static_property(host(), "LockedRead", TypeRef::i32())
            .readable();
        assert_eq!(PropertyPlug::new(read_only).keys().len(), 2);
    }
}
