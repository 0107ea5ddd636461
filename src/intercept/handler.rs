//! Per-member redirection logic.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::{
    engine::{CallFrame, TrampolineAction},
    intercept::Callback,
    member::{join_types, MemberKey, MethodDescriptor},
    types::{TypeRef, Value},
    Error, Result,
};

/// Redirection logic bound to one member.
///
/// A handler owns the callback supplied for a member and decides, for every intercepted call,
/// what the caller observes and whether the original implementation still runs. Handlers are
/// shared between the plug that created them and the [`crate::intercept::DispatchTable`], so all
/// methods take `&self`.
pub trait Handler: Send + Sync {
    /// Returns the member this handler serves.
    fn key(&self) -> &MemberKey;

    /// Checks that the callback can stand in for `original`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterMismatch`] or [`Error::ReturnTypeMismatch`] naming the member
    /// and both signatures.
    fn assert_matches(&self, original: &MethodDescriptor) -> Result<()>;

    /// Handles one intercepted call.
    ///
    /// Callback failures are recorded in the frame.
    fn invoke(&self, frame: &mut CallFrame) -> TrampolineAction;

    /// Sets whether the original implementation runs after the callback.
    fn set_call_original(&self, call_original: bool);

    /// Returns whether the original implementation runs after the callback.
    fn should_call_original(&self) -> bool;
}

/// State shared by every handler variant.
struct HandlerCore {
    key: MemberKey,
    callback: Callback,
    /// Declaring type of instance members, used to validate a leading receiver parameter.
    receiver: Option<TypeRef>,
    call_original: AtomicBool,
}

impl HandlerCore {
    fn new(target: &MethodDescriptor, callback: Callback) -> Self {
        Self {
            key: target.key(),
            callback,
            receiver: (!target.is_static()).then(|| target.declaring_type().clone()),
            call_original: AtomicBool::new(false),
        }
    }

    fn action(&self) -> TrampolineAction {
        if self.call_original.load(Ordering::Acquire) {
            TrampolineAction::CallOriginal
        } else {
            TrampolineAction::SkipOriginal
        }
    }

    /// Accepted callback shapes:
    ///
    /// - no parameters at all (arguments are dropped)
    /// - exactly the member's parameters, each assignable from the original
    /// - for instance members, a leading receiver followed by the member's parameters
    fn assert_parameters(&self, original: &MethodDescriptor) -> Result<()> {
        let declared = self.callback.parameters();
        let params = original.parameters();

        let matches = if declared.is_empty() {
            true
        } else if declared.len() == params.len() {
            all_assignable(declared, params)
        } else if declared.len() == params.len() + 1 {
            match &self.receiver {
                Some(receiver) => {
                    declared[0].is_assignable_from(receiver)
                        && all_assignable(&declared[1..], params)
                }
                None => false,
            }
        } else {
            false
        };

        if matches {
            return Ok(());
        }

        let mut original_list: Vec<String> = Vec::with_capacity(params.len() + 1);
        if let Some(receiver) = &self.receiver {
            original_list.push(format!("{} this", receiver.full_name()));
        }
        original_list.extend(params.iter().map(TypeRef::full_name));

        Err(Error::ParameterMismatch {
            member: original.full_name(),
            callback: or_empty(join_types(declared)),
            original: or_empty(original_list.join(", ")),
        })
    }

    fn assert_return(&self, original: &MethodDescriptor) -> Result<()> {
        let declared = self.callback.return_type();
        if original.return_type().is_assignable_from(declared) {
            return Ok(());
        }

        Err(Error::ReturnTypeMismatch {
            member: original.full_name(),
            callback: declared.full_name(),
            original: original.return_type().full_name(),
        })
    }

    /// Runs the callback with the arguments its declared shape asks for.
    fn run(&self, frame: &CallFrame) -> Result<Value> {
        let declared = self.callback.parameters().len();
        if declared == 0 {
            return self.callback.invoke(&[]);
        }

        match frame.receiver() {
            Some(receiver) if declared == frame.args().len() + 1 => {
                let mut args = Vec::with_capacity(declared);
                args.push(receiver.clone());
                args.extend_from_slice(frame.args());
                self.callback.invoke(&args)
            }
            _ => self.callback.invoke(frame.args()),
        }
    }
}

fn all_assignable(declared: &[TypeRef], original: &[TypeRef]) -> bool {
    declared
        .iter()
        .zip(original)
        .all(|(d, o)| d.is_assignable_from(o))
}

fn or_empty(list: String) -> String {
    if list.is_empty() {
        "<empty>".to_string()
    } else {
        list
    }
}

macro_rules! delegate_core {
    () => {
        fn key(&self) -> &MemberKey {
            &self.core.key
        }

        fn set_call_original(&self, call_original: bool) {
            self.core.call_original.store(call_original, Ordering::Release);
        }

        fn should_call_original(&self) -> bool {
            self.core.call_original.load(Ordering::Acquire)
        }
    };
}

/// Handler for `void` members: the callback runs for its side effects.
pub struct ActionHandler {
    core: HandlerCore,
}

impl ActionHandler {
    /// Binds `callback` to `target`.
    #[must_use]
    pub fn new(target: &MethodDescriptor, callback: Callback) -> Self {
        Self {
            core: HandlerCore::new(target, callback),
        }
    }
}

impl Handler for ActionHandler {
    delegate_core!();

    fn assert_matches(&self, original: &MethodDescriptor) -> Result<()> {
        self.core.assert_parameters(original)
    }

    fn invoke(&self, frame: &mut CallFrame) -> TrampolineAction {
        if let Err(e) = self.core.run(frame) {
            frame.fail(e);
        }
        self.core.action()
    }
}

/// Handler for value-returning members whose callback provides the value.
pub struct FuncHandler {
    core: HandlerCore,
}

impl FuncHandler {
    /// Binds `callback` to `target`.
    #[must_use]
    pub fn new(target: &MethodDescriptor, callback: Callback) -> Self {
        Self {
            core: HandlerCore::new(target, callback),
        }
    }
}

impl Handler for FuncHandler {
    delegate_core!();

    fn assert_matches(&self, original: &MethodDescriptor) -> Result<()> {
        self.core.assert_parameters(original)?;
        self.core.assert_return(original)
    }

    fn invoke(&self, frame: &mut CallFrame) -> TrampolineAction {
        match self.core.run(frame) {
            Ok(value) => frame.set_result(value),
            Err(e) => frame.fail(e),
        }
        self.core.action()
    }
}

/// Handler for value-returning members plugged with a side-effect callback.
///
/// The caller observes the default value of the member's return type; for `Task<T>` that is a
/// completed task holding the default of `T`.
pub struct DefaultReturnHandler {
    core: HandlerCore,
    default: Value,
}

impl DefaultReturnHandler {
    /// Binds `callback` to `target`.
    #[must_use]
    pub fn new(target: &MethodDescriptor, callback: Callback) -> Self {
        Self {
            core: HandlerCore::new(target, callback),
            default: Value::default_for(target.return_type()),
        }
    }
}

impl Handler for DefaultReturnHandler {
    delegate_core!();

    fn assert_matches(&self, original: &MethodDescriptor) -> Result<()> {
        self.core.assert_parameters(original)
    }

    fn invoke(&self, frame: &mut CallFrame) -> TrampolineAction {
        match self.core.run(frame) {
            Ok(_) => frame.set_result(self.default.clone()),
            Err(e) => frame.fail(e),
        }
        self.core.action()
    }
}
