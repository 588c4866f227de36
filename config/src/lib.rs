//! Configuration types and loading for the staging sync services.
//!
//! Configuration is layered: a base file, an environment specific file and
//! `APP_`-prefixed environment variables, see [`load_config`].

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
