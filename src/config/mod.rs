//! Run configuration for workflow-templater.
//!
//! Settings come from three layers: built-in defaults, the YAML config file
//! (`<user config dir>/workflow-templater/config.yaml` unless `--config` is
//! given) and command-line flags, the last one winning. The merged tree may
//! reference its own keys with template expressions, so it is stabilized
//! with the fixed-point resolver before being deserialized.

mod model;
mod operations;

#[cfg(test)]
mod tests;

pub use model::RunConfig;
pub use operations::load_config_file;
