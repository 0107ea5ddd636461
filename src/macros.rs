#![allow(unused_macros)]

/// Helper macro for locking items
///
/// Recovers the guard from a poisoned lock.
///
/// ```rust, ignore
///  let mut data = lock!(my_mutex);
///  data.insert(key, value);
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    };
}

/// Implements [`crate::types::Marshal`] for integer types that widen into one
/// [`crate::types::Value`] variant.
///
/// ```rust, ignore
///  impl_marshal_int!(I32 as i32, i32 => TypeRef::i32, u8 => TypeRef::u8);
/// ```
macro_rules! impl_marshal_int {
    ($variant:ident as $wide:ty, $($ty:ty => $ctor:path),+ $(,)?) => {
        $(
            impl crate::types::Marshal for $ty {
                fn type_ref() -> crate::types::TypeRef {
                    $ctor()
                }

                #[allow(clippy::cast_lossless, clippy::cast_possible_wrap)]
                fn into_value(self) -> crate::types::Value {
                    crate::types::Value::$variant(self as $wide)
                }

                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                fn from_value(value: crate::types::Value) -> crate::Result<Self> {
                    match value {
                        crate::types::Value::$variant(v) => Ok(v as $ty),
                        other => Err(crate::types::marshal_error::<Self>(&other)),
                    }
                }
            }
        )+
    };
}

/// Implements [`crate::intercept::IntoCallback`] for closures of one arity.
///
/// Each `$arg $val` pair names a generic parameter type and the binding its
/// unmarshaled argument is stored in.
macro_rules! impl_into_callback {
    ($($arg:ident $val:ident),*) => {
        impl<Func, Ret, $($arg,)*> crate::intercept::IntoCallback<($($arg,)*), Ret> for Func
        where
            Func: Fn($($arg),*) -> Ret + Send + Sync + 'static,
            Ret: crate::types::Marshal,
            $($arg: crate::types::Marshal,)*
        {
            #[allow(unused_mut, unused_variables)]
            fn into_callback(self) -> crate::intercept::Callback {
                crate::intercept::Callback::new(
                    vec![$(<$arg as crate::types::Marshal>::type_ref()),*],
                    <Ret as crate::types::Marshal>::type_ref(),
                    move |args: &[crate::types::Value]| {
                        let mut args = args.iter().cloned();
                        $(
                            let $val = <$arg as crate::types::Marshal>::from_value(
                                crate::intercept::next_arg(&mut args)?,
                            )?;
                        )*
                        Ok(crate::types::Marshal::into_value((self)($($val),*)))
                    },
                )
            }
        }

        impl<$($arg,)*> crate::engine::IntoArgs for ($($arg,)*)
        where
            $($arg: crate::types::Marshal,)*
        {
            #[allow(non_snake_case)]
            fn into_args(self) -> Vec<crate::types::Value> {
                let ($($val,)*) = self;
                vec![$(crate::types::Marshal::into_value($val)),*]
            }
        }
    };
}

/// Boxes a list of plugs into the batch shape expected by [`crate::apply_all`].
///
/// ```rust,ignore
/// use staticplug::{apply_all, plugs};
///
/// let scope = apply_all(plugs![method_plug, property_plug]).await?;
/// ```
#[macro_export]
macro_rules! plugs {
    ($($plug:expr),* $(,)?) => {
        vec![$(Box::new($plug) as Box<dyn $crate::plug::Plug>),*]
    };
}
