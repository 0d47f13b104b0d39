//! Preview handle management.
//!
//! A preview handle is a revocable local reference (`blob:opener/<id>`) that a
//! playback surface resolves to the current asset's bytes. The
//! [`PreviewUrlManager`] keeps at most one handle alive at a time.

mod handle;
mod manager;

pub use handle::PreviewHandle;
pub use manager::{PreviewStats, PreviewUrlManager};
