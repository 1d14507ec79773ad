//! Data region facade: reads
//!
//! Every public read goes through the epoch guard: drain navigation events,
//! make sure the root is live, note the epoch, read, and retry if the epoch
//! moved while reading. Mutations live in [`super::actions`].

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

use super::cache::{RegionCache, RegionScope};
use super::columns::{ColumnDescriptor, ColumnSet};
use super::paging::PagingCounts;
use crate::config::Config;
use crate::driver::Locator;
use crate::element::ElementHandle;
use crate::session::{BrowserSession, LifecycleSubscription};
use crate::signal::CompletionSignal;
use crate::{Error, Result};

/// Reads retried at most this many times when the page keeps changing underneath
pub const MAX_READ_ATTEMPTS: usize = 3;

/// Which region to open
#[derive(Debug, Clone)]
pub enum RegionTarget {
    /// Region name, matched against the root's name attribute
    Name(String),
    /// Root handle built by the caller
    Root(Arc<ElementHandle>),
}

impl From<&str> for RegionTarget {
    fn from(name: &str) -> Self {
        RegionTarget::Name(name.to_string())
    }
}

impl From<String> for RegionTarget {
    fn from(name: String) -> Self {
        RegionTarget::Name(name)
    }
}

impl From<Arc<ElementHandle>> for RegionTarget {
    fn from(root: Arc<ElementHandle>) -> Self {
        RegionTarget::Root(root)
    }
}

/// Run `$read` under the epoch guard of `$table`
macro_rules! settled {
    ($table:ident, $what:expr, $read:expr) => {{
        let mut attempt = 0;
        loop {
            attempt += 1;
            let epoch = $table.begin_read().await?;
            let value = $read;
            if $table.read_settled(epoch) {
                break value;
            }
            if attempt >= $crate::region::table::MAX_READ_ATTEMPTS {
                return Err($crate::Error::stale_recovery(format!(
                    "{} kept changing during {} attempts",
                    $what, attempt
                )));
            }
            tracing::debug!("{} raced an invalidation, reading again", $what);
        }
    }};
}

pub(super) use settled;

/// Observe and drive one data region
///
/// Not `Clone`: the cache and its lifecycle subscription belong to this
/// instance, and every operation takes `&mut self`.
#[derive(Debug)]
pub struct DataRegionTable {
    pub(super) config: Arc<Config>,
    pub(super) root: Arc<ElementHandle>,
    pub(super) region_name: Option<String>,
    pub(super) cache: RegionCache,
    pub(super) lifecycle: LifecycleSubscription,
    pub(super) signal: CompletionSignal,
}

impl DataRegionTable {
    /// Bind to a region on the session's current page
    ///
    /// Nothing is read until the first operation.
    pub fn open(session: &BrowserSession, target: impl Into<RegionTarget>) -> Result<Self> {
        let config = session.config();
        let (root, region_name) = match target.into() {
            RegionTarget::Name(name) => {
                let root = Arc::new(session.handle(config.markup.root(&name)));
                (root, Some(name))
            }
            RegionTarget::Root(root) => (root, None),
        };

        let cache = RegionCache::new();
        let flag = cache.flag();
        root.on_re_resolve(move |_| flag.raise())?;

        Ok(Self {
            config,
            root,
            region_name,
            cache,
            lifecycle: session.lifecycle().subscribe(),
            signal: session.completion_signal(),
        })
    }

    pub fn root(&self) -> &Arc<ElementHandle> {
        &self.root
    }

    /// Current cache epoch
    pub fn epoch(&self) -> u64 {
        self.cache.epoch()
    }

    /// Completion signal waits performed by this table
    pub fn signal_waits(&self) -> u64 {
        self.signal.waits()
    }

    /// Drop everything cached
    pub fn invalidate(&mut self) {
        self.cache.invalidate("requested");
    }

    /// Fold navigation events, root staleness and raised flags into the epoch
    pub(super) async fn begin_read(&mut self) -> Result<u64> {
        let navigations = self.lifecycle.drain();
        for _ in 0..navigations {
            self.cache.invalidate("page navigation");
        }

        if self.root.is_stale().await? {
            self.root.resolve().await?;
        }

        if navigations > 0 {
            self.cache.discard_pending();
        } else {
            self.cache.sync();
        }
        Ok(self.cache.epoch())
    }

    pub(super) fn read_settled(&mut self, epoch: u64) -> bool {
        for _ in 0..self.lifecycle.drain() {
            self.cache.invalidate("page navigation");
        }
        self.cache.sync();
        self.cache.epoch() == epoch
    }

    pub(super) async fn load_region_name(&mut self) -> Result<String> {
        if let Some(name) = &self.region_name {
            return Ok(name.clone());
        }

        let attribute = &self.config.markup.region_name_attribute;
        let name = self
            .root
            .attribute(attribute)
            .await?
            .ok_or_else(|| Error::not_found(format!("{} on region root", attribute)))?;
        self.region_name = Some(name.clone());
        Ok(name)
    }

    pub(super) async fn load_column_set(&mut self) -> Result<ColumnSet> {
        let region = self.load_region_name().await?;
        let scope = RegionScope {
            root: &self.root,
            region: &region,
            markup: &self.config.markup,
        };
        Ok(self.cache.columns(&scope).await?.clone())
    }

    pub(super) async fn load_columns(&mut self) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.load_column_set().await?.columns().to_vec())
    }

    pub(super) async fn load_column_index(&mut self, name: &str) -> Result<i32> {
        let region = self.load_region_name().await?;
        let scope = RegionScope {
            root: &self.root,
            region: &region,
            markup: &self.config.markup,
        };
        Ok(self.cache.columns(&scope).await?.index_of(name))
    }

    /// Logical index of a column that must exist
    pub(super) async fn load_required_column(&mut self, name: &str) -> Result<usize> {
        let index = self.load_column_index(name).await?;
        usize::try_from(index).map_err(|_| Error::not_found(format!("column '{}'", name)))
    }

    pub(super) async fn load_row_handle(&mut self, row: usize) -> Result<Arc<ElementHandle>> {
        let region = self.load_region_name().await?;
        let scope = RegionScope {
            root: &self.root,
            region: &region,
            markup: &self.config.markup,
        };
        self.cache.row(&scope, row).await
    }

    pub(super) async fn load_row_count(&mut self) -> Result<usize> {
        let region = self.load_region_name().await?;
        let scope = RegionScope {
            root: &self.root,
            region: &region,
            markup: &self.config.markup,
        };
        Ok(self.cache.rows(&scope).await?.len())
    }

    async fn load_cell(&mut self, row: usize, column: usize) -> Result<String> {
        let region = self.load_region_name().await?;
        let scope = RegionScope {
            root: &self.root,
            region: &region,
            markup: &self.config.markup,
        };
        self.cache.cell_text(&scope, row, column).await
    }

    async fn load_column_values(&mut self, column: usize) -> Result<Vec<String>> {
        let rows = self.load_row_count().await?;
        let mut values = Vec::with_capacity(rows);
        for row in 0..rows {
            values.push(self.load_cell(row, column).await?);
        }
        Ok(values)
    }

    async fn load_row(&mut self, row: usize) -> Result<Vec<String>> {
        let columns = self.load_columns().await?.len();
        let mut values = Vec::with_capacity(columns);
        for column in 0..columns {
            values.push(self.load_cell(row, column).await?);
        }
        Ok(values)
    }

    pub(super) async fn load_selected(&mut self, row: usize) -> Result<bool> {
        let region = self.load_region_name().await?;
        let scope = RegionScope {
            root: &self.root,
            region: &region,
            markup: &self.config.markup,
        };
        self.cache.row_selected(&scope, row).await
    }

    pub(super) async fn load_key(&mut self, row: usize) -> Result<String> {
        let region = self.load_region_name().await?;
        let scope = RegionScope {
            root: &self.root,
            region: &region,
            markup: &self.config.markup,
        };
        self.cache.row_key(&scope, row).await
    }

    /// Region name from the root's name attribute
    pub async fn region_name(&mut self) -> Result<String> {
        Ok(settled!(self, "region_name", self.load_region_name().await?))
    }

    pub async fn columns(&mut self) -> Result<Vec<ColumnDescriptor>> {
        Ok(settled!(self, "columns", self.load_columns().await?))
    }

    pub async fn column_names(&mut self) -> Result<Vec<String>> {
        let columns = self.columns().await?;
        Ok(columns.into_iter().map(|c| c.name).collect())
    }

    pub async fn column_labels(&mut self) -> Result<Vec<String>> {
        let columns = self.columns().await?;
        Ok(columns.into_iter().map(|c| c.label).collect())
    }

    /// Logical index of a column by name or label, -1 when nothing matches
    #[instrument(skip(self))]
    pub async fn column_index(&mut self, name_or_label: &str) -> Result<i32> {
        Ok(settled!(self, "column_index", self.load_column_index(name_or_label).await?))
    }

    /// Number of data rows on the current page
    pub async fn row_count(&mut self) -> Result<usize> {
        Ok(settled!(self, "row_count", self.load_row_count().await?))
    }

    /// Text of the cell at `row` and logical `column`
    pub async fn data_as_text(&mut self, row: usize, column: usize) -> Result<String> {
        Ok(settled!(self, "data_as_text", self.load_cell(row, column).await?))
    }

    /// Text of the cell at `row` in the named column
    pub async fn data_as_text_by_column(&mut self, row: usize, column: &str) -> Result<String> {
        Ok(settled!(self, "data_as_text", {
            let index = self.load_required_column(column).await?;
            self.load_cell(row, index).await?
        }))
    }

    /// Every value of the named column, top to bottom
    pub async fn column_values(&mut self, column: &str) -> Result<Vec<String>> {
        Ok(settled!(self, "column_values", {
            let index = self.load_required_column(column).await?;
            self.load_column_values(index).await?
        }))
    }

    /// Every cell of `row`, left to right
    pub async fn row_data_as_text(&mut self, row: usize) -> Result<Vec<String>> {
        Ok(settled!(self, "row_data_as_text", self.load_row(row).await?))
    }

    /// First row whose `column` equals `value`, -1 if none
    pub async fn row_index(&mut self, column: &str, value: &str) -> Result<i32> {
        Ok(settled!(self, "row_index", {
            match usize::try_from(self.load_column_index(column).await?) {
                Ok(index) => self
                    .load_column_values(index)
                    .await?
                    .iter()
                    .position(|v| v == value)
                    .map(|row| row as i32)
                    .unwrap_or(-1),
                Err(_) => -1,
            }
        }))
    }

    /// All rows keyed by column name
    pub async fn rows_as_maps(&mut self) -> Result<Vec<BTreeMap<String, String>>> {
        Ok(settled!(self, "rows_as_maps", {
            let columns = self.load_columns().await?;
            let rows = self.load_row_count().await?;
            let mut maps = Vec::with_capacity(rows);
            for row in 0..rows {
                let mut map = BTreeMap::new();
                for column in &columns {
                    map.insert(column.name.clone(), self.load_cell(row, column.index).await?);
                }
                maps.push(map);
            }
            maps
        }))
    }

    pub async fn is_row_selected(&mut self, row: usize) -> Result<bool> {
        Ok(settled!(self, "is_row_selected", self.load_selected(row).await?))
    }

    /// Primary keys of the checked rows on the current page
    pub async fn selected_keys(&mut self) -> Result<Vec<String>> {
        Ok(settled!(self, "selected_keys", {
            let rows = self.load_row_count().await?;
            let mut keys = Vec::new();
            for row in 0..rows {
                if self.load_selected(row).await? {
                    keys.push(self.load_key(row).await?);
                }
            }
            keys
        }))
    }

    /// Parsed paging counter, `None` when the region shows no counter
    pub async fn paging_counts(&mut self) -> Result<Option<PagingCounts>> {
        Ok(settled!(self, "paging_counts", {
            let locator = Locator::css(&self.config.markup.paging_count);
            let counters = self.root.find_all(&locator).await?;
            match counters.first() {
                Some(counter) => PagingCounts::parse(&self.root.driver().text(counter).await?),
                None => None,
            }
        }))
    }
}
