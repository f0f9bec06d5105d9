pub mod config;
pub mod diff;
pub mod error;
pub mod model;
pub mod server;
pub mod service;
pub mod store;

pub use config::{AppConfig, LimitsConfig, ServerConfig, StorageConfig};
pub use diff::{diff_lines, Change, ChangeKind, DiffSummary};
pub use error::{VersoError, VersoResult};
pub use model::*;
pub use service::{VersionControlService, VersionDiff};
