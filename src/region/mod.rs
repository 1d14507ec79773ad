//! # Data regions
//!
//! Tabular widgets rendered by the application under test.
//!
//! ## Modules
//! - `markup`: selectors describing the rendered region
//! - `columns`: column descriptors and name resolution
//! - `cache`: per-epoch structural and data cache
//! - `paging`: paging counter parsing
//! - `table`: [`DataRegionTable`] and its reads
//! - `actions`: sort, filter, paging, selection, insert and delete

pub mod markup;
pub mod columns;
pub mod cache;
pub mod paging;
pub mod table;
pub mod actions;

pub use actions::{FilterType, SortDirection};
pub use cache::{CacheState, InvalidationFlag, RegionCache, RowHandle};
pub use columns::{ColumnDescriptor, ColumnSet};
pub use markup::RegionMarkup;
pub use paging::PagingCounts;
pub use table::{DataRegionTable, RegionTarget, MAX_READ_ATTEMPTS};
