pub mod config;
pub mod types;

pub use config::{SpaceLeftConfig, WorkspaceConfig};
pub use types::*;
