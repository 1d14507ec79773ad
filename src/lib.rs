//! Region-Oxide: observe and drive data regions in a live browser page
//!
//! A data region is a table widget that re-renders itself asynchronously
//! when sorted, filtered, paged or edited. This library gives functional
//! tests a race-free view of one: element handles that survive re-renders,
//! a cache keyed to page lifecycle, and completion signals that tell when a
//! page-side update has finished.

pub mod error;
pub mod config;
pub mod wait;

pub mod cdp;
pub mod driver;
pub mod element;
pub mod session;
pub mod signal;
pub mod region;

// Re-exports
pub use error::{Error, Result};
pub use region::{DataRegionTable, FilterType, RegionTarget, SortDirection};
pub use session::BrowserSession;

/// Region-Oxide library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
