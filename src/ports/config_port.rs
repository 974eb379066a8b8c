//! Configuration access port trait.

/// Raw string lookup. Typed, strict parsing lives in
/// [`config_validation`](crate::domain::config_validation).
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
}
