//! Markup conventions of a rendered data region

use serde::Deserialize;

use crate::driver::{css_quote, Locator};

/// Selectors and attribute names used to read a data region
///
/// Defaults match the stock region renderer; any field can be overridden in
/// the `[markup]` table of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegionMarkup {
    /// Attribute on the root element carrying the region name
    pub region_name_attribute: String,
    pub root_tag: String,
    /// Every header cell of the region, selector header included
    pub header_cell: String,
    /// Header attribute of the form `<region>:<field>`
    pub column_attribute: String,
    pub data_row: String,
    pub cell: String,
    pub row_checkbox: String,
    pub toggle_all_checkbox: String,
    /// Field name of the leading selector column
    pub selector_column_field: String,
    pub action_attribute: String,
    pub filter_dialog: String,
    pub filter_type: String,
    pub filter_value: String,
    pub page_size_attribute: String,
    pub page_attribute: String,
    pub paging_count: String,
    pub insert_form: String,
    pub signal_container: String,
}

impl Default for RegionMarkup {
    fn default() -> Self {
        Self {
            region_name_attribute: "data-region-name".to_string(),
            root_tag: "table".to_string(),
            header_cell: "th".to_string(),
            column_attribute: "data-column".to_string(),
            data_row: "tr.region-row, tr.region-alternate-row".to_string(),
            cell: "td".to_string(),
            row_checkbox: "input[name='.select']".to_string(),
            toggle_all_checkbox: "input[name='.toggle']".to_string(),
            selector_column_field: "~select".to_string(),
            action_attribute: "data-action".to_string(),
            filter_dialog: ".region-filter-dialog".to_string(),
            filter_type: "select[name='filter-type']".to_string(),
            filter_value: "input[name='filter-value']".to_string(),
            page_size_attribute: "data-page-size".to_string(),
            page_attribute: "data-page".to_string(),
            paging_count: ".region-paging-count".to_string(),
            insert_form: ".region-insert-form".to_string(),
            signal_container: "#testSignals".to_string(),
        }
    }
}

impl RegionMarkup {
    /// Root element of the region named `region`
    pub fn root(&self, region: &str) -> Locator {
        Locator::css(format!(
            "{}[{}={}]",
            self.root_tag,
            self.region_name_attribute,
            css_quote(region)
        ))
    }

    /// Control carrying `data-action="<action>"`
    pub fn action(&self, action: &str) -> Locator {
        Locator::css(format!("[{}={}]", self.action_attribute, css_quote(action)))
    }

    /// Header cell whose column attribute is exactly `raw`
    pub fn header_with_attribute(&self, raw: &str) -> Locator {
        Locator::css(format!("[{}={}]", self.column_attribute, css_quote(raw)))
    }

    pub fn page_size(&self, size: usize) -> Locator {
        Locator::css(format!("[{}={}]", self.page_size_attribute, css_quote(&size.to_string())))
    }

    pub fn page(&self, page: usize) -> Locator {
        Locator::css(format!("[{}={}]", self.page_attribute, css_quote(&page.to_string())))
    }

    /// Row checkbox whose value is `key`
    pub fn row_checkbox_for(&self, key: &str) -> Locator {
        Locator::css(format!("{}[value={}]", self.row_checkbox, css_quote(key)))
    }

    /// Input of `field` inside the insert form
    pub fn field_input(&self, field: &str) -> Locator {
        Locator::css(format!("{} [name={}]", self.insert_form, css_quote(field)))
    }
}
