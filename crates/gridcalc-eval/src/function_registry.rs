use crate::function::Function;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Process-wide function library, keyed by exact name.
static REG: Lazy<DashMap<&'static str, Arc<dyn Function>>> = Lazy::new(DashMap::new);

/// Adds `f`, replacing any function with the same name.
pub fn register(f: Arc<dyn Function>) {
    REG.insert(f.name(), f);
}

pub fn get(name: &str) -> Option<Arc<dyn Function>> {
    REG.get(name).map(|v| Arc::clone(v.value()))
}

pub fn is_registered(name: &str) -> bool {
    REG.contains_key(name)
}
