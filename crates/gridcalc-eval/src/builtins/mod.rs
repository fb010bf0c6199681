pub mod datetime;
pub mod logical;
pub mod math;
pub mod text;
mod utils;

use std::sync::Once;

static LOAD: Once = Once::new();

/// Registers every built-in function. Idempotent.
pub fn load_builtins() {
    LOAD.call_once(|| {
        logical::register_builtins();
        math::register_builtins();
        text::register_builtins();
        datetime::register_builtins();
    });
}
