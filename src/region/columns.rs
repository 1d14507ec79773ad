//! Column descriptors and name resolution

use serde::Serialize;

/// One data column, in logical position (selector column excluded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub index: usize,
    /// Field name from the header attribute
    pub name: String,
    /// Visible header text
    pub label: String,
    /// Column attribute as rendered, used to find the header again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// Raw header cell as read from the page
#[derive(Debug, Clone, Default)]
pub struct HeaderCell {
    /// Value of the column attribute, if present
    pub attribute: Option<String>,
    pub label: String,
    /// Whether the cell holds the select-all checkbox
    pub has_toggle: bool,
}

/// Field part of a `<region>:<field>` column attribute
pub fn parse_column_attribute(region: &str, raw: &str) -> String {
    let prefix = format!("{}:", region);
    if let Some(field) = raw.strip_prefix(&prefix) {
        return field.to_string();
    }
    match raw.split_once(':') {
        Some((_, field)) => field.to_string(),
        None => raw.to_string(),
    }
}

/// Whitespace removed and lowercased, for lenient comparison
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Ordered columns of one table, built once per cache epoch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSet {
    columns: Vec<ColumnDescriptor>,
    /// Cells before the first data column (1 when a selector column leads)
    offset: usize,
}

impl ColumnSet {
    pub fn from_headers(region: &str, headers: Vec<HeaderCell>, selector_field: &str) -> Self {
        let mut headers = headers.into_iter().peekable();

        let leading_selector = headers
            .peek()
            .map(|h| {
                h.has_toggle
                    || h.attribute
                        .as_deref()
                        .map(|a| parse_column_attribute(region, a) == selector_field)
                        .unwrap_or(false)
            })
            .unwrap_or(false);
        if leading_selector {
            headers.next();
        }

        let columns = headers
            .enumerate()
            .map(|(index, header)| ColumnDescriptor {
                index,
                name: header
                    .attribute
                    .as_deref()
                    .map(|a| parse_column_attribute(region, a))
                    .unwrap_or_else(|| header.label.clone()),
                label: header.label,
                attribute: header.attribute,
            })
            .collect();

        Self {
            columns,
            offset: usize::from(leading_selector),
        }
    }

    /// Logical index of a column by name or label, -1 if none matches
    ///
    /// Tries the exact name, then the name and finally the label with
    /// whitespace removed, ignoring case. First match wins.
    pub fn index_of(&self, name_or_label: &str) -> i32 {
        let wanted = normalize(name_or_label);

        self.columns
            .iter()
            .find(|c| c.name == name_or_label)
            .or_else(|| self.columns.iter().find(|c| normalize(&c.name) == wanted))
            .or_else(|| self.columns.iter().find(|c| normalize(&c.label) == wanted))
            .map(|c| c.index as i32)
            .unwrap_or(-1)
    }

    /// Cell position in a row for a logical column index
    pub fn dom_index(&self, column: usize) -> usize {
        column + self.offset
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn has_selector(&self) -> bool {
        self.offset > 0
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn get(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
