// Adapters - External system implementations

pub mod mock;
pub mod toml_config;
pub mod ytdlp_exec;
pub mod ytdlp_probe;

// Re-export adapters
pub use mock::{MockBehavior, MockClipExecutor, MockMetadataProvider};
pub use toml_config::{ClipperConfig, ConfigError};
pub use ytdlp_exec::YtDlpExecutor;
pub use ytdlp_probe::YtDlpMetadataAdapter;
