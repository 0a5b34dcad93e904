/// Tracing subscriber setup.
pub mod logging;
/// TOML configuration (`forma.toml`).
pub mod toml_config;
