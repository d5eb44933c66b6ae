pub mod config;
pub mod git;
pub mod logging;
pub mod record;
pub mod store;

pub use config::{Settings, STATE_DIR};
pub use git::{GitConflict, GitRepo};
pub use record::{DecisionRecord, DecisionStats};
pub use store::{BackupStore, DecisionLog};
