pub mod backend;
mod client;
pub mod error;
mod models;
mod path;
mod retry;

pub use crate::backend::Connector;
pub use crate::client::TransferClient;
pub use crate::models::{ArtifactMetadata, ChildRef, ItemInfo, ItemKind, epoch_millis};
pub use crate::path::{join_url, normalize as normalize_path, prefix as normalize_prefix};
#[cfg(any(test, feature = "mock"))]
pub use crate::retry::RecordingSleeper;
pub use crate::retry::{Sleeper, SleeperHandle, TokioSleeper};
pub use artifs_config::ListingStrategy;
use std::sync::Arc;

pub type ConnectorHandle = Arc<dyn Connector + Send + Sync>;
pub type ClientHandle = Arc<TransferClient>;
