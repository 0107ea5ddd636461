use std::{fmt, sync::Arc};

use crate::{
    engine::PatchEngine,
    intercept::{ActionHandler, Callback, DefaultReturnHandler, FuncHandler, Handler, IntoCallback},
    member::{KeyGuard, MemberKey, MethodDescriptor},
    plug::{sealed::Lifecycle, Plug, PlugCore},
    types::Marshal,
    Error, Result,
};

/// Replacement behavior for one method.
///
/// Configuration calls replace each other: the last of [`returns`](Self::returns),
/// [`returns_value`](Self::returns_value) and [`callback`](Self::callback) wins. Call-through is
/// an independent toggle.
///
/// # Callback Shapes
///
/// A callback may take no parameters at all, exactly the method's parameters, or, for instance
/// methods, the receiver followed by the method's parameters. Each declared parameter type must
/// accept the corresponding original argument; this is checked when the plug is applied.
///
/// # Examples
///
/// ```rust,ignore
/// use staticplug::{apply_all, plugs, MethodPlug};
///
/// let plug = MethodPlug::new(parse_descriptor())?
///     .returns(|text: String, radix: i32| text.len() as i32 * radix)?;
///
/// let _scope = apply_all(plugs![plug]).await?;
/// ```
pub struct MethodPlug {
    core: PlugCore,
    method: MethodDescriptor,
    handler: Option<Arc<dyn Handler>>,
    call_original: bool,
}

impl MethodPlug {
    fn create(method: MethodDescriptor) -> Self {
        let core = PlugCore::new(format!("staticplug.{method}"), method.key());
        Self {
            core,
            method,
            handler: None,
            call_original: false,
        }
    }

    /// Creates a plug for a static method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaticMismatch`] if `method` is an instance method.
    pub fn new(method: MethodDescriptor) -> Result<Self> {
        if !method.is_static() {
            return Err(Error::StaticMismatch(format!(
                "'{}' on '{}' is not static. Use MethodPlug::instance to plug it.",
                method.name(),
                method.declaring_type().full_name()
            )));
        }
        Ok(Self::create(method))
    }

    /// Creates a plug for an instance method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaticMismatch`] if `method` is static.
    pub fn instance(method: MethodDescriptor) -> Result<Self> {
        if method.is_static() {
            return Err(Error::StaticMismatch(format!(
                "'{}' on '{}' is static. Use MethodPlug::new to plug it.",
                method.name(),
                method.declaring_type().full_name()
            )));
        }
        Ok(Self::create(method))
    }

    /// Returns the plugged method.
    #[must_use]
    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    /// Makes the method return whatever `callback` returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotValueReturning`] if the method returns `void`.
    pub fn returns<Args, R>(mut self, callback: impl IntoCallback<Args, R>) -> Result<Self> {
        if !self.method.returns_value() {
            return Err(Error::NotValueReturning(self.method.full_name()));
        }
        self.handler = Some(Arc::new(FuncHandler::new(
            &self.method,
            callback.into_callback(),
        )));
        Ok(self)
    }

    /// Makes the method return `value` on every call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotValueReturning`] if the method returns `void`.
    pub fn returns_value<T: Marshal>(self, value: T) -> Result<Self> {
        let callback = Callback::constant(T::type_ref(), value.into_value());
        self.returns(callback)
    }

    /// Runs `callback` instead of the method.
    ///
    /// For value-returning methods the caller receives the default value of the return type,
    /// e.g. `0`, `null` or a completed task.
    #[must_use]
    pub fn callback<Args, R>(mut self, callback: impl IntoCallback<Args, R>) -> Self {
        let callback = callback.into_callback();
        let handler: Arc<dyn Handler> = if self.method.returns_value() {
            Arc::new(DefaultReturnHandler::new(&self.method, callback))
        } else {
            Arc::new(ActionHandler::new(&self.method, callback))
        };
        self.handler = Some(handler);
        self
    }

    /// Also runs the original method after the callback.
    ///
    /// The original's return value is what the caller observes.
    #[must_use]
    pub fn call_original(mut self, call_original: bool) -> Self {
        self.call_original = call_original;
        self
    }
}

impl Plug for MethodPlug {
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

impl Lifecycle for MethodPlug {
    fn hold(&mut self, guard: KeyGuard) {
        self.core.hold(guard);
    }

    fn apply(&mut self, engine: &Arc<dyn PatchEngine>) -> Result<()> {
        if self.core.is_applied() {
            return Ok(());
        }
        if let Some(handler) = &self.handler {
            self.core
                .patch(engine, &self.method, handler, self.call_original)?;
        }
        self.core.mark_applied();
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.core.release()
    }
}

impl fmt::Debug for MethodPlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodPlug")
            .field("id", &self.core.id())
            .field("configured", &self.handler.is_some())
            .field("call_original", &self.call_original)
            .field("applied", &self.core.is_applied())
            .finish()
    }
}
