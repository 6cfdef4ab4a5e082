pub mod error;
pub mod loader;
pub mod map;
pub mod sources;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use map::{ConfigEntry, ConfigMap};
pub use sources::{ConfigSource, EnvSource, FileSource, LiteralSource};
