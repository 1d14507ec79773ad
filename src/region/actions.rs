//! Data region facade: mutations
//!
//! Each mutation performs its UI action inside a completion signal wait and
//! invalidates the cache once the signal is seen.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::table::{settled, DataRegionTable};
use crate::driver::Locator;
use crate::element::ElementHandle;
use crate::signal::{selection_signal, update_signal};
use crate::{Error, Result};

/// Column filter operators understood by the filter dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Equal,
    NotEqualOrBlank,
    Contains,
    StartsWith,
    GreaterThan,
    LessThan,
    IsBlank,
    IsNotBlank,
}

impl FilterType {
    /// Option value in the filter type select
    pub fn token(&self) -> &'static str {
        match self {
            FilterType::Equal => "eq",
            FilterType::NotEqualOrBlank => "neqornull",
            FilterType::Contains => "contains",
            FilterType::StartsWith => "startswith",
            FilterType::GreaterThan => "gt",
            FilterType::LessThan => "lt",
            FilterType::IsBlank => "isblank",
            FilterType::IsNotBlank => "isnonblank",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        let filter = match token {
            "eq" => FilterType::Equal,
            "neqornull" => FilterType::NotEqualOrBlank,
            "contains" => FilterType::Contains,
            "startswith" => FilterType::StartsWith,
            "gt" => FilterType::GreaterThan,
            "lt" => FilterType::LessThan,
            "isblank" => FilterType::IsBlank,
            "isnonblank" => FilterType::IsNotBlank,
            _ => return None,
        };
        Some(filter)
    }

    /// Whether the operator compares against a value
    pub fn takes_value(&self) -> bool {
        !matches!(self, FilterType::IsBlank | FilterType::IsNotBlank)
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn action(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "sort-asc",
            SortDirection::Descending => "sort-desc",
        }
    }
}

/// Click, and on interception scroll into view and click once more
async fn click_with_scroll_retry(target: &ElementHandle) -> Result<()> {
    match target.click().await {
        Err(e) if e.is_click_intercepted() => {
            warn!("{}, scrolling into view and retrying", e);
            target.scroll_into_view().await?;
            target.click().await
        }
        other => other,
    }
}

impl DataRegionTable {
    /// Handle searched in the whole document (dialogs, forms)
    fn document_handle(&self, locator: Locator) -> ElementHandle {
        ElementHandle::new(
            Arc::clone(self.root.driver()),
            locator,
            self.config.element_timeout(),
            self.config.poll_interval(),
        )
    }

    /// `data-action` control inside the region
    fn region_action(&self, action: &str) -> ElementHandle {
        self.root.child(self.config.markup.action(action), 0)
    }

    /// `data-action` control inside the header cell of `column`
    ///
    /// The header is found by its column attribute exactly as rendered, or by
    /// position among the header cells when it has none.
    async fn header_action(&mut self, column: &str, action: &str) -> Result<ElementHandle> {
        let (attribute, position) = settled!(self, "header lookup", {
            let index = self.load_required_column(column).await?;
            let columns = self.load_column_set().await?;
            let attribute = columns
                .get(index)
                .ok_or_else(|| Error::not_found(format!("column '{}'", column)))?
                .attribute
                .clone();
            (attribute, columns.dom_index(index))
        });

        let markup = &self.config.markup;
        let header = match attribute {
            Some(raw) => self.root.child(markup.header_with_attribute(&raw), 0),
            None => self.root.child(Locator::css(&markup.header_cell), position),
        };
        Ok(Arc::new(header).child(markup.action(action), 0))
    }

    async fn current_region(&mut self) -> Result<String> {
        Ok(settled!(self, "region_name", self.load_region_name().await?))
    }

    /// Run `trigger` inside the update signal wait, then invalidate
    async fn run_update<F, Fut>(&mut self, what: &str, trigger: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let signal = update_signal(&self.current_region().await?);
        self.signal
            .await_signal(&signal, self.config.update_timeout(), trigger)
            .await?;
        self.cache.invalidate(what);
        Ok(())
    }

    /// Run `trigger` inside the selection signal wait, then invalidate
    async fn run_selection<F, Fut>(&mut self, what: &str, trigger: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let signal = selection_signal(&self.current_region().await?);
        self.signal
            .await_signal(&signal, self.config.selection_timeout(), trigger)
            .await?;
        self.cache.invalidate(what);
        Ok(())
    }

    async fn open_filter_dialog(&mut self, column: &str) -> Result<Arc<ElementHandle>> {
        let opener = self.header_action(column, "filter").await?;
        opener.click().await?;
        Ok(Arc::new(
            self.document_handle(Locator::css(&self.config.markup.filter_dialog)),
        ))
    }

    /// Filter `column` with `filter_type`; `value` is ignored by the blank checks
    #[instrument(skip(self))]
    pub async fn set_filter(&mut self, column: &str, filter_type: FilterType, value: &str) -> Result<()> {
        let dialog = self.open_filter_dialog(column).await?;
        let markup = &self.config.markup;

        dialog
            .child(Locator::css(&markup.filter_type), 0)
            .set_value(filter_type.token())
            .await?;
        if filter_type.takes_value() {
            dialog
                .child(Locator::css(&markup.filter_value), 0)
                .set_value(value)
                .await?;
        }

        let apply = dialog.child(markup.action("apply-filter"), 0);
        self.run_update("set_filter", || async move { apply.click().await })
            .await?;
        info!("Filtered '{}' {} '{}'", column, filter_type, value);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn clear_filter(&mut self, column: &str) -> Result<()> {
        let dialog = self.open_filter_dialog(column).await?;
        let clear = dialog.child(self.config.markup.action("clear-filter"), 0);
        self.run_update("clear_filter", || async move { clear.click().await })
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_sort(&mut self, column: &str, direction: SortDirection) -> Result<()> {
        let control = self.header_action(column, direction.action()).await?;
        self.run_update("set_sort", || async move { control.click().await })
            .await
    }

    #[instrument(skip(self))]
    pub async fn clear_sort(&mut self, column: &str) -> Result<()> {
        let control = self.header_action(column, "clear-sort").await?;
        self.run_update("clear_sort", || async move { control.click().await })
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_page_size(&mut self, size: usize) -> Result<()> {
        let control = self.root.child(self.config.markup.page_size(size), 0);
        self.run_update("set_page_size", || async move { control.click().await })
            .await
    }

    /// Jump to a 1-based page
    #[instrument(skip(self))]
    pub async fn go_to_page(&mut self, page: usize) -> Result<()> {
        let control = self.root.child(self.config.markup.page(page), 0);
        self.run_update("go_to_page", || async move { control.click().await })
            .await
    }

    pub async fn first_page(&mut self) -> Result<()> {
        let control = self.region_action("page-first");
        self.run_update("first_page", || async move { control.click().await })
            .await
    }

    pub async fn previous_page(&mut self) -> Result<()> {
        let control = self.region_action("page-prev");
        self.run_update("previous_page", || async move { control.click().await })
            .await
    }

    pub async fn next_page(&mut self) -> Result<()> {
        let control = self.region_action("page-next");
        self.run_update("next_page", || async move { control.click().await })
            .await
    }

    pub async fn last_page(&mut self) -> Result<()> {
        let control = self.region_action("page-last");
        self.run_update("last_page", || async move { control.click().await })
            .await
    }

    /// Flip the selector checkbox of `row`
    ///
    /// A click landing on an overlapping element is retried once after
    /// scrolling the checkbox into view; a second interception is returned.
    #[instrument(skip(self))]
    pub async fn toggle_row_selection(&mut self, row: usize) -> Result<()> {
        let row_handle = settled!(self, "toggle_row_selection", self.load_row_handle(row).await?);
        let checkbox = row_handle.child(Locator::css(&self.config.markup.row_checkbox), 0);
        self.run_selection("toggle_row_selection", || async move {
            click_with_scroll_retry(&checkbox).await
        })
        .await
    }

    /// Check the row whose selector value is `key`; no-op if already checked
    #[instrument(skip(self))]
    pub async fn select_row_by_key(&mut self, key: &str) -> Result<()> {
        let checkbox = self.root.child(self.config.markup.row_checkbox_for(key), 0);
        if checkbox.is_checked().await? {
            return Ok(());
        }
        self.run_selection("select_row_by_key", || async move {
            click_with_scroll_retry(&checkbox).await
        })
        .await
    }

    async fn set_all_on_page(&mut self, checked: bool) -> Result<()> {
        let toggle = self
            .root
            .child(Locator::css(&self.config.markup.toggle_all_checkbox), 0);
        if toggle.is_checked().await? == checked {
            return Ok(());
        }
        self.run_selection("toggle_all", || async move {
            click_with_scroll_retry(&toggle).await
        })
        .await
    }

    pub async fn check_all_on_page(&mut self) -> Result<()> {
        self.set_all_on_page(true).await
    }

    pub async fn uncheck_all_on_page(&mut self) -> Result<()> {
        self.set_all_on_page(false).await
    }

    /// Open the insert form, fill `values` by field name and submit
    #[instrument(skip(self, values))]
    pub async fn insert_row(&mut self, values: &[(&str, &str)]) -> Result<()> {
        self.region_action("insert-row").click().await?;

        for (field, value) in values {
            self.document_handle(self.config.markup.field_input(field))
                .set_value(value)
                .await?;
        }

        let form = Arc::new(self.document_handle(Locator::css(&self.config.markup.insert_form)));
        let submit = form.child(self.config.markup.action("submit-insert"), 0);
        self.run_update("insert_row", || async move { submit.click().await })
            .await?;
        info!("Inserted row with {} values", values.len());
        Ok(())
    }

    /// Delete the checked rows
    #[instrument(skip(self))]
    pub async fn delete_rows(&mut self) -> Result<()> {
        let control = self.region_action("delete-rows");
        self.run_update("delete_rows", || async move { control.click().await })
            .await
    }
}
