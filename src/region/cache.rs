//! Structural and data cache of one region
//!
//! Everything here lives for one epoch. Invalidation drops all of it and
//! bumps the epoch; repopulation happens lazily on the next read.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::columns::{ColumnSet, HeaderCell};
use super::markup::RegionMarkup;
use crate::driver::Locator;
use crate::element::ElementHandle;
use crate::{Error, Result};

/// Invalidation requests raised from handle listeners
///
/// Listeners run inside driver calls and cannot reach the cache, so they
/// bump this counter and the table folds it in at read boundaries.
#[derive(Debug, Clone, Default)]
pub struct InvalidationFlag(Arc<AtomicU64>);

impl InvalidationFlag {
    pub fn raise(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn pending(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn take(&self) -> u64 {
        self.0.swap(0, Ordering::SeqCst)
    }
}

/// A data row for the current epoch
#[derive(Debug, Clone)]
pub struct RowHandle {
    pub index: usize,
    pub node: Arc<ElementHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Populated,
}

/// What the cache needs to know to read from the page
#[derive(Debug, Clone, Copy)]
pub struct RegionScope<'a> {
    pub root: &'a Arc<ElementHandle>,
    pub region: &'a str,
    pub markup: &'a RegionMarkup,
}

#[derive(Debug, Default)]
pub struct RegionCache {
    epoch: u64,
    columns: Option<ColumnSet>,
    rows: Option<Vec<RowHandle>>,
    cells: HashMap<(usize, usize), String>,
    selection: HashMap<usize, bool>,
    row_keys: HashMap<usize, String>,
    pending: InvalidationFlag,
}

impl RegionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Flag handed to handle listeners
    pub fn flag(&self) -> InvalidationFlag {
        self.pending.clone()
    }

    pub fn state(&self) -> CacheState {
        let empty = self.columns.is_none()
            && self.rows.is_none()
            && self.cells.is_empty()
            && self.selection.is_empty()
            && self.row_keys.is_empty();
        if empty {
            CacheState::Empty
        } else {
            CacheState::Populated
        }
    }

    pub fn invalidate(&mut self, reason: &str) {
        self.columns = None;
        self.rows = None;
        self.cells.clear();
        self.selection.clear();
        self.row_keys.clear();
        self.epoch += 1;
        debug!("Region cache invalidated ({}), epoch {}", reason, self.epoch);
    }

    /// Apply raised invalidation requests; true if the epoch moved
    pub fn sync(&mut self) -> bool {
        if self.pending.take() > 0 {
            self.invalidate("handle re-resolved");
            true
        } else {
            false
        }
    }

    /// Drop raised requests already covered by an invalidation
    pub fn discard_pending(&mut self) {
        self.pending.take();
    }

    pub async fn columns(&mut self, scope: &RegionScope<'_>) -> Result<&ColumnSet> {
        if self.columns.is_none() {
            let headers = read_headers(scope).await?;
            let set = ColumnSet::from_headers(scope.region, headers, &scope.markup.selector_column_field);
            debug!(
                "Region '{}' has {} columns (offset {})",
                scope.region,
                set.len(),
                set.offset()
            );
            self.columns = Some(set);
        }
        self.columns
            .as_ref()
            .ok_or_else(|| Error::internal("column set missing after population"))
    }

    pub async fn rows(&mut self, scope: &RegionScope<'_>) -> Result<&[RowHandle]> {
        if self.rows.is_none() {
            let locator = Locator::css(&scope.markup.data_row);
            let nodes = scope.root.find_all(&locator).await?;

            let mut rows = Vec::with_capacity(nodes.len());
            for (index, node) in nodes.into_iter().enumerate() {
                let handle = Arc::new(scope.root.child(locator.clone(), index).with_node(node));
                let flag = self.pending.clone();
                handle.on_re_resolve(move |_| flag.raise())?;
                rows.push(RowHandle { index, node: handle });
            }
            debug!("Region '{}' has {} data rows", scope.region, rows.len());
            self.rows = Some(rows);
        }
        Ok(self.rows.as_deref().unwrap_or(&[]))
    }

    pub async fn row(&mut self, scope: &RegionScope<'_>, index: usize) -> Result<Arc<ElementHandle>> {
        let rows = self.rows(scope).await?;
        rows.get(index)
            .map(|r| Arc::clone(&r.node))
            .ok_or_else(|| Error::not_found(format!("row {} of {} in '{}'", index, rows.len(), scope.region)))
    }

    /// Text of a logical cell, memoized for the epoch
    pub async fn cell_text(&mut self, scope: &RegionScope<'_>, row: usize, column: usize) -> Result<String> {
        if let Some(text) = self.cells.get(&(row, column)) {
            return Ok(text.clone());
        }

        let columns = self.columns(scope).await?;
        if column >= columns.len() {
            return Err(Error::not_found(format!(
                "column {} of {} in '{}'",
                column,
                columns.len(),
                scope.region
            )));
        }
        let position = columns.dom_index(column);
        let handle = self.row(scope, row).await?;

        let driver = scope.root.driver();
        let cell_locator = Locator::css(&scope.markup.cell);
        let cells = &cell_locator;
        let text = handle
            .access(|node| async move {
                let found = driver.find_elements(Some(&node), cells).await?;
                match found.get(position) {
                    Some(cell) => driver.text(cell).await,
                    None => Err(Error::not_found(format!("cell {} of row {}", position, row))),
                }
            })
            .await?;

        self.cells.insert((row, column), text.clone());
        Ok(text)
    }

    /// Checked state of the row's selector checkbox, memoized for the epoch
    pub async fn row_selected(&mut self, scope: &RegionScope<'_>, row: usize) -> Result<bool> {
        if let Some(selected) = self.selection.get(&row) {
            return Ok(*selected);
        }

        let handle = self.row(scope, row).await?;
        let driver = scope.root.driver();
        let checkbox = Locator::css(&scope.markup.row_checkbox);
        let checkbox = &checkbox;
        let selected = handle
            .access(|node| async move {
                match driver.find_elements(Some(&node), checkbox).await?.first() {
                    Some(input) => driver.is_checked(input).await,
                    None => Err(Error::not_found(format!("{} in row {}", checkbox, row))),
                }
            })
            .await?;

        self.selection.insert(row, selected);
        Ok(selected)
    }

    /// Primary key carried by the row's selector checkbox, memoized for the epoch
    pub async fn row_key(&mut self, scope: &RegionScope<'_>, row: usize) -> Result<String> {
        if let Some(key) = self.row_keys.get(&row) {
            return Ok(key.clone());
        }

        let handle = self.row(scope, row).await?;
        let driver = scope.root.driver();
        let checkbox = Locator::css(&scope.markup.row_checkbox);
        let checkbox = &checkbox;
        let key = handle
            .access(|node| async move {
                match driver.find_elements(Some(&node), checkbox).await?.first() {
                    Some(input) => driver.attribute(input, "value").await,
                    None => Err(Error::not_found(format!("{} in row {}", checkbox, row))),
                }
            })
            .await?
            .unwrap_or_default();

        self.row_keys.insert(row, key.clone());
        Ok(key)
    }
}

async fn read_headers(scope: &RegionScope<'_>) -> Result<Vec<HeaderCell>> {
    let driver = scope.root.driver();
    let header_locator = Locator::css(&scope.markup.header_cell);
    let toggle_locator = Locator::css(&scope.markup.toggle_all_checkbox);
    let attribute = scope.markup.column_attribute.as_str();
    let (headers, toggle) = (&header_locator, &toggle_locator);

    scope
        .root
        .access(|table| async move {
            let mut cells = Vec::new();
            for cell in driver.find_elements(Some(&table), headers).await? {
                cells.push(HeaderCell {
                    attribute: driver.attribute(&cell, attribute).await?,
                    label: driver.text(&cell).await?,
                    has_toggle: !driver.find_elements(Some(&cell), toggle).await?.is_empty(),
                });
            }
            Ok(cells)
        })
        .await
}
