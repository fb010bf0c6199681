#[macro_export]
macro_rules! register_functions {
    ( $($fn:path),+ $(,)? ) => {{
        use std::sync::Arc;
        $(
            $crate::function_registry::register(Arc::new($fn));
        )+
    }};
}

/// Expands to a `caps()` method returning the union of the named
/// [`FnCaps`](crate::function::FnCaps) flags.
#[macro_export]
macro_rules! func_caps {
    ( $($cap:ident),+ $(,)? ) => {
        fn caps(&self) -> $crate::function::FnCaps {
            $crate::function::FnCaps::empty() $( | $crate::function::FnCaps::$cap )+
        }
    };
}
