//! # Element handles
//!
//! A handle wraps a locator and a search scope and re-locates its node when
//! the page replaces it.

pub mod handle;
pub mod state;

pub use handle::{ElementHandle, ReResolveListener};
pub use state::{Probe, ReResolved, Resolution};
