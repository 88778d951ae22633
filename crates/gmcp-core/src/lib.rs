//! Shared runtime pieces: tracing, settings, path expansion, fan-out

pub mod fanout;
pub mod paths;
pub mod settings;
pub mod tracing;

pub use fanout::{settle_all, Settled};
pub use paths::resolve_path;
pub use settings::{Service, Settings, SettingsError};
pub use tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
