//! Shared test fixtures
//!
//! `FakeRegion` is a small data-region application living in a `MockDom`.
//! It keeps its rows server-side, re-renders the whole table on every data
//! change (so handles go stale the way they do in a real page) and flips the
//! `update-<region>` / `select-<region>` markers when an update finishes.

#![allow(dead_code)]

use region_oxide::config::Config;
use region_oxide::driver::{El, MockDom, NodeRef};
use region_oxide::session::BrowserSession;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

pub const REGION: &str = "jobs";
pub const PAGE_SIZES: [usize; 3] = [2, 20, 100];

/// Timeouts short enough for tests, long enough for a loaded CI machine
pub fn test_config() -> Config {
    Config {
        element_timeout_ms: 1_000,
        poll_interval_ms: 10,
        update_timeout_ms: 500,
        selection_timeout_ms: 500,
        navigation_timeout_ms: 1_000,
        ..Config::default()
    }
}

#[derive(Debug, Clone)]
struct FakeRow {
    key: String,
    values: Vec<String>,
}

#[derive(Debug)]
struct AppState {
    columns: Vec<(String, String)>,
    rows: Vec<FakeRow>,
    next_key: u64,
    selected: BTreeSet<String>,
    filter: Option<(usize, String, String)>,
    sort: Option<(usize, bool)>,
    page_size: usize,
    page: usize,
    silent: bool,
    renders: usize,
    /// Selector header rendered without its column attribute
    bare_selector: bool,
    /// Prefix of the header column attributes
    column_prefix: String,
}

fn compare(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn matches_filter(value: &str, op: &str, operand: &str) -> bool {
    match op {
        "eq" => value == operand,
        "neqornull" => value != operand,
        "contains" => value.contains(operand),
        "startswith" => value.starts_with(operand),
        "gt" => compare(value, operand) == Ordering::Greater,
        "lt" => compare(value, operand) == Ordering::Less,
        "isblank" => value.is_empty(),
        "isnonblank" => !value.is_empty(),
        _ => true,
    }
}

impl AppState {
    fn visible(&self) -> Vec<FakeRow> {
        let mut rows: Vec<FakeRow> = self
            .rows
            .iter()
            .filter(|row| match &self.filter {
                Some((column, op, operand)) => matches_filter(&row.values[*column], op, operand),
                None => true,
            })
            .cloned()
            .collect();

        if let Some((column, ascending)) = self.sort {
            rows.sort_by(|a, b| compare(&a.values[column], &b.values[column]));
            if !ascending {
                rows.reverse();
            }
        }
        rows
    }

    fn page_count(&self, total: usize) -> usize {
        total.div_ceil(self.page_size).max(1)
    }

    fn column_of(&self, field: &str) -> Option<usize> {
        self.columns.iter().position(|(f, _)| f == field)
    }

    fn build(&self) -> El {
        let visible = self.visible();
        let total = visible.len();
        let start = (self.page - 1) * self.page_size;
        let page_rows: Vec<&FakeRow> = visible.iter().skip(start).take(self.page_size).collect();
        let all_checked = !page_rows.is_empty() && page_rows.iter().all(|r| self.selected.contains(&r.key));

        let action = |name: &str| El::new("span").attr("data-action", name);

        let toggle = El::new("input")
            .attr("type", "checkbox")
            .attr("name", ".toggle")
            .checked(all_checked);
        let selector = if self.bare_selector {
            El::new("th").child(toggle)
        } else {
            El::new("th")
                .attr("data-column", format!("{}:~select", self.column_prefix))
                .child(toggle)
        };
        let mut header = El::new("tr").child(selector);
        for (field, label) in &self.columns {
            header = header.child(
                El::new("th")
                    .attr("data-column", format!("{}:{}", self.column_prefix, field))
                    .text(label.clone())
                    .child(action("sort-asc"))
                    .child(action("sort-desc"))
                    .child(action("clear-sort"))
                    .child(action("filter")),
            );
        }

        let mut body = El::new("tbody");
        for (i, row) in page_rows.iter().enumerate() {
            let mut tr = El::new("tr")
                .class(if i % 2 == 0 { "region-row" } else { "region-alternate-row" })
                .child(
                    El::new("td").child(
                        El::new("input")
                            .attr("type", "checkbox")
                            .attr("name", ".select")
                            .attr("value", row.key.clone())
                            .checked(self.selected.contains(&row.key)),
                    ),
                );
            for value in &row.values {
                tr = tr.child(El::new("td").text(value.clone()));
            }
            body = body.child(tr);
        }
        body = body.child(
            El::new("tr")
                .class("region-total-row")
                .child(El::new("td").text(format!("Total: {}", total))),
        );

        let counter = if total == 0 {
            "No data to show.".to_string()
        } else {
            format!("{} - {} of {}", start + 1, start + page_rows.len(), total)
        };
        let mut footer = El::new("td")
            .child(El::new("span").class("region-paging-count").text(counter))
            .child(action("page-first"))
            .child(action("page-prev"))
            .child(action("page-next"))
            .child(action("page-last"))
            .child(action("insert-row"))
            .child(action("delete-rows"));
        for size in PAGE_SIZES {
            footer = footer.child(El::new("a").attr("data-page-size", size.to_string()));
        }
        for page in 1..=self.page_count(total) {
            footer = footer.child(El::new("a").attr("data-page", page.to_string()));
        }

        El::new("table")
            .attr("data-region-name", REGION)
            .child(El::new("thead").child(header))
            .child(body)
            .child(El::new("tfoot").child(El::new("tr").child(footer)))
    }
}

/// Fake application serving one data region
#[derive(Clone)]
pub struct FakeRegion {
    dom: MockDom,
    state: Arc<Mutex<AppState>>,
}

impl FakeRegion {
    /// Mount a region with `(field, label)` columns and rows of values
    pub fn new(columns: &[(&str, &str)], rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .enumerate()
            .map(|(i, values)| FakeRow {
                key: (i + 1).to_string(),
                values: values.iter().map(|v| v.to_string()).collect(),
            })
            .collect::<Vec<_>>();

        let app = Self {
            dom: MockDom::new(),
            state: Arc::new(Mutex::new(AppState {
                columns: columns
                    .iter()
                    .map(|(f, l)| (f.to_string(), l.to_string()))
                    .collect(),
                next_key: rows.len() as u64 + 1,
                rows,
                selected: BTreeSet::new(),
                filter: None,
                sort: None,
                page_size: 100,
                page: 1,
                silent: false,
                renders: 0,
                bare_selector: false,
                column_prefix: REGION.to_string(),
            })),
        };

        let loader = app.clone();
        app.dom.on_navigate(move |_, _| loader.mount());
        app.mount();
        app
    }

    /// The jobs region used by most tests
    pub fn jobs() -> Self {
        Self::new(
            &[("RowId", "Row Id"), ("DisplayName", "Display Name"), ("Status", "Status")],
            &[
                &["1", "Alpha", "COMPLETE"],
                &["2", "Bravo", "ERROR"],
                &["3", "Charlie", "COMPLETE"],
            ],
        )
    }

    pub fn dom(&self) -> &MockDom {
        &self.dom
    }

    pub fn session(&self) -> BrowserSession {
        BrowserSession::new(Arc::new(self.dom.clone()), test_config())
    }

    fn state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap()
    }

    /// Stop flipping completion markers
    pub fn set_silent(&self, silent: bool) {
        self.state().silent = silent;
    }

    /// Render the selector header with only its select-all checkbox
    pub fn set_bare_selector_header(&self, bare: bool) {
        self.state().bare_selector = bare;
        self.rerender();
    }

    /// Prefix header attributes with `prefix` instead of the region name
    pub fn set_column_prefix(&self, prefix: &str) {
        self.state().column_prefix = prefix.to_string();
        self.rerender();
    }

    /// Number of table renders so far
    pub fn renders(&self) -> usize {
        self.state().renders
    }

    /// Change a stored value without telling anyone
    pub fn set_value(&self, key: &str, field: &str, value: &str) {
        let mut state = self.state();
        let column = state.column_of(field).unwrap();
        let row = state.rows.iter_mut().find(|r| r.key == key).unwrap();
        row.values[column] = value.to_string();
    }

    /// Row checkbox currently rendered for `key`
    pub fn checkbox(&self, key: &str) -> NodeRef {
        self.dom
            .select(&format!("input[name='.select'][value='{}']", key))
            .unwrap()
            .remove(0)
    }

    pub fn table_node(&self) -> Option<NodeRef> {
        self.dom
            .select(&format!("table[data-region-name='{}']", REGION))
            .unwrap()
            .into_iter()
            .next()
    }

    fn mount(&self) {
        self.dom
            .append(&self.dom.body(), El::new("div").attr("id", "testSignals"))
            .unwrap();
        self.rerender();
    }

    /// Replace the rendered table with a fresh one
    pub fn rerender(&self) {
        let el = {
            let mut state = self.state();
            state.renders += 1;
            state.build()
        };
        let table = match self.table_node() {
            Some(old) => self.dom.replace(&old, el).unwrap(),
            None => self.dom.append(&self.dom.body(), el).unwrap(),
        };
        self.wire(&table);
    }

    fn signal(&self, name: String) {
        if self.state().silent {
            return;
        }
        let container = self.dom.select("#testSignals").unwrap().remove(0);
        self.dom
            .append(&container, El::new("input").attr("type", "hidden").attr("name", name))
            .unwrap();
    }

    fn updated(&self) {
        self.rerender();
        self.signal(format!("update-{}", REGION));
    }

    fn on_click<F>(&self, node: &NodeRef, handler: F)
    where
        F: Fn(&FakeRegion, &NodeRef) + Send + Sync + 'static,
    {
        let app = self.clone();
        self.dom.on_click(node, move |_, node| handler(&app, node)).unwrap();
    }

    fn wire(&self, table: &NodeRef) {
        let dom = &self.dom;

        for node in dom.select_within(table, "[data-action]").unwrap() {
            let action = dom.attr_of(&node, "data-action").unwrap();
            let field = dom
                .closest_with_attr(&node, "data-column")
                .and_then(|header| dom.attr_of(&header, "data-column"))
                .and_then(|attr| attr.split_once(':').map(|(_, f)| f.to_string()));
            self.on_click(&node, move |app, _| app.action(&action, field.as_deref()));
        }

        for node in dom.select_within(table, "[data-page-size]").unwrap() {
            let size: usize = dom.attr_of(&node, "data-page-size").unwrap().parse().unwrap();
            self.on_click(&node, move |app, _| {
                {
                    let mut state = app.state();
                    state.page_size = size;
                    state.page = 1;
                }
                app.updated();
            });
        }

        for node in dom.select_within(table, "[data-page]").unwrap() {
            let page: usize = dom.attr_of(&node, "data-page").unwrap().parse().unwrap();
            self.on_click(&node, move |app, _| {
                app.state().page = page;
                app.updated();
            });
        }

        for node in dom.select_within(table, "input[name='.select']").unwrap() {
            self.on_click(&node, |app, checkbox| {
                let key = app.dom.attr_of(checkbox, "value").unwrap();
                let checked = app.dom.checked_of(checkbox);
                {
                    let mut state = app.state();
                    if checked {
                        state.selected.insert(key);
                    } else {
                        state.selected.remove(&key);
                    }
                }
                app.signal(format!("select-{}", REGION));
            });
        }

        for node in dom.select_within(table, "input[name='.toggle']").unwrap() {
            self.on_click(&node, |app, toggle| {
                let checked = app.dom.checked_of(toggle);
                {
                    let mut state = app.state();
                    let visible = state.visible();
                    let start = (state.page - 1) * state.page_size;
                    let keys: Vec<String> = visible
                        .iter()
                        .skip(start)
                        .take(state.page_size)
                        .map(|r| r.key.clone())
                        .collect();
                    for key in keys {
                        if checked {
                            state.selected.insert(key);
                        } else {
                            state.selected.remove(&key);
                        }
                    }
                }
                app.rerender();
                app.signal(format!("select-{}", REGION));
            });
        }
    }

    fn action(&self, action: &str, field: Option<&str>) {
        let column = field.and_then(|f| self.state().column_of(f));
        match (action, column) {
            ("sort-asc", Some(c)) => self.resort(Some((c, true))),
            ("sort-desc", Some(c)) => self.resort(Some((c, false))),
            ("clear-sort", Some(_)) => self.resort(None),
            ("filter", Some(c)) => self.open_filter_dialog(c),
            ("page-first", _) => self.turn_page(|_, _| 1),
            ("page-prev", _) => self.turn_page(|page, _| page.saturating_sub(1).max(1)),
            ("page-next", _) => self.turn_page(|page, count| (page + 1).min(count)),
            ("page-last", _) => self.turn_page(|_, count| count),
            ("insert-row", _) => self.open_insert_form(),
            ("delete-rows", _) => {
                {
                    let mut state = self.state();
                    let selected = std::mem::take(&mut state.selected);
                    state.rows.retain(|r| !selected.contains(&r.key));
                }
                self.updated();
            }
            _ => {}
        }
    }

    fn resort(&self, sort: Option<(usize, bool)>) {
        {
            let mut state = self.state();
            state.sort = sort;
            state.page = 1;
        }
        self.updated();
    }

    fn turn_page(&self, to: impl Fn(usize, usize) -> usize) {
        {
            let mut state = self.state();
            let count = state.page_count(state.visible().len());
            state.page = to(state.page, count);
        }
        self.updated();
    }

    fn open_filter_dialog(&self, column: usize) {
        let dialog = self
            .dom
            .append(
                &self.dom.body(),
                El::new("div")
                    .class("region-filter-dialog")
                    .child(El::new("select").attr("name", "filter-type").attr("value", "eq"))
                    .child(El::new("input").attr("name", "filter-value"))
                    .child(El::new("button").attr("data-action", "apply-filter"))
                    .child(El::new("button").attr("data-action", "clear-filter")),
            )
            .unwrap();

        let apply = self
            .dom
            .select_within(&dialog, "[data-action='apply-filter']")
            .unwrap()
            .remove(0);
        let dialog_node = dialog.clone();
        self.on_click(&apply, move |app, _| {
            let op = app
                .dom
                .select_within(&dialog_node, "select[name='filter-type']")
                .ok()
                .and_then(|n| app.dom.attr_of(&n[0], "value"))
                .unwrap_or_default();
            let operand = app
                .dom
                .select_within(&dialog_node, "input[name='filter-value']")
                .ok()
                .and_then(|n| app.dom.attr_of(&n[0], "value"))
                .unwrap_or_default();
            {
                let mut state = app.state();
                state.filter = Some((column, op, operand));
                state.page = 1;
            }
            app.dom.detach(&dialog_node).unwrap();
            app.updated();
        });

        let clear = self
            .dom
            .select_within(&dialog, "[data-action='clear-filter']")
            .unwrap()
            .remove(0);
        let dialog_node = dialog;
        self.on_click(&clear, move |app, _| {
            app.state().filter = None;
            app.dom.detach(&dialog_node).unwrap();
            app.updated();
        });
    }

    fn open_insert_form(&self) {
        let fields: Vec<String> = self.state().columns.iter().map(|(f, _)| f.clone()).collect();
        let form = self
            .dom
            .append(
                &self.dom.body(),
                El::new("div")
                    .class("region-insert-form")
                    .children(fields.iter().map(|f| El::new("input").attr("name", f.clone())))
                    .child(El::new("button").attr("data-action", "submit-insert")),
            )
            .unwrap();

        let submit = self
            .dom
            .select_within(&form, "[data-action='submit-insert']")
            .unwrap()
            .remove(0);
        self.on_click(&submit, move |app, _| {
            let values: Vec<String> = fields
                .iter()
                .map(|field| {
                    app.dom
                        .select_within(&form, &format!("input[name='{}']", field))
                        .ok()
                        .and_then(|n| app.dom.attr_of(&n[0], "value"))
                        .unwrap_or_default()
                })
                .collect();
            {
                let mut state = app.state();
                let key = state.next_key.to_string();
                state.next_key += 1;
                state.rows.push(FakeRow { key, values });
            }
            app.dom.detach(&form).unwrap();
            app.updated();
        });
    }
}
