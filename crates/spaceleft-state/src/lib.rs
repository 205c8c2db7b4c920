//! spaceleft-state: job settings and build history for spaceleft.
//!
//! Backed by [redb](https://docs.rs/redb). Holds the per-job space settings
//! the admission check reads, and the parameters recorded for each build
//! (most importantly the measured `workspaceSize`).
//!
//! All values are JSON-serialized into redb's `&[u8]` value columns. Build
//! keys are `{job}:{number:020}`, so a prefix scan over one job yields its
//! builds oldest first.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and doubles as a [`spaceleft_core::JobLookup`].

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
