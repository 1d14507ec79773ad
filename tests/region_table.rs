//! Data region integration tests
//!
//! Every test drives a `FakeRegion` that re-renders its table the way a live
//! page does, so stale handles, cache epochs and completion markers are all
//! exercised end to end.

mod common;

use common::{FakeRegion, REGION};
use region_oxide::driver::Locator;
use region_oxide::region::PagingCounts;
use region_oxide::{Error, FilterType, SortDirection};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Column lookup accepts the field name, its lowercase form and the label
#[tokio::test]
async fn test_column_index_spellings() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    let by_name = table.column_index("DisplayName").await.unwrap();
    assert_eq!(by_name, 1);
    assert_eq!(table.column_index("displayname").await.unwrap(), by_name);
    assert_eq!(table.column_index("Display Name").await.unwrap(), by_name);
    assert_eq!(table.column_index("Missing").await.unwrap(), -1);

    assert_eq!(table.column_names().await.unwrap(), vec!["RowId", "DisplayName", "Status"]);
    assert_eq!(table.column_labels().await.unwrap(), vec!["Row Id", "Display Name", "Status"]);
}

#[tokio::test]
async fn test_basic_reads() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    assert_eq!(table.region_name().await.unwrap(), REGION);
    assert_eq!(table.row_count().await.unwrap(), 3);
    assert_eq!(table.data_as_text(1, 1).await.unwrap(), "Bravo");
    assert_eq!(table.data_as_text_by_column(2, "Status").await.unwrap(), "COMPLETE");
    assert_eq!(table.row_data_as_text(0).await.unwrap(), vec!["1", "Alpha", "COMPLETE"]);
    assert_eq!(table.row_index("DisplayName", "Charlie").await.unwrap(), 2);
    assert_eq!(table.row_index("DisplayName", "Zulu").await.unwrap(), -1);
    assert_eq!(table.row_index("Missing", "Alpha").await.unwrap(), -1);

    let maps = table.rows_as_maps().await.unwrap();
    assert_eq!(maps.len(), 3);
    assert_eq!(maps[1]["DisplayName"], "Bravo");
    assert_eq!(maps[1]["Status"], "ERROR");

    assert_eq!(
        table.paging_counts().await.unwrap(),
        Some(PagingCounts { first: 1, last: 3, total: 3 })
    );
}

#[tokio::test]
async fn test_out_of_range_reads_are_not_found() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    assert!(matches!(table.data_as_text(7, 0).await, Err(Error::NotFound(_))));
    assert!(matches!(table.column_values("Missing").await, Err(Error::NotFound(_))));
    assert!(matches!(
        table.data_as_text_by_column(0, "Missing").await,
        Err(Error::NotFound(_))
    ));
}

/// Repeated reads of one cell hit the cache
#[tokio::test]
async fn test_cell_reads_are_memoized() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    assert_eq!(table.data_as_text(0, 2).await.unwrap(), "COMPLETE");
    let reads = app.dom().text_reads();
    assert_eq!(table.data_as_text(0, 2).await.unwrap(), "COMPLETE");
    assert_eq!(app.dom().text_reads(), reads);
}

/// Filtering three rows down to two waits on exactly one completion signal
#[tokio::test]
async fn test_filter_waits_once_and_reads_new_rows() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();
    assert_eq!(table.row_count().await.unwrap(), 3);

    let waits = table.signal_waits();
    table
        .set_filter("Status", FilterType::Equal, "COMPLETE")
        .await
        .unwrap();

    assert_eq!(table.signal_waits(), waits + 1);
    assert_eq!(table.row_count().await.unwrap(), 2);
    assert_eq!(table.column_values("Status").await.unwrap(), vec!["COMPLETE", "COMPLETE"]);
    assert_eq!(table.column_values("DisplayName").await.unwrap(), vec!["Alpha", "Charlie"]);

    // Filter dialog is gone once the update lands
    assert!(app.dom().select(".region-filter-dialog").unwrap().is_empty());
}

#[tokio::test]
async fn test_valueless_filter_and_clear() {
    let app = FakeRegion::new(
        &[("Name", "Name"), ("Comment", "Comment")],
        &[&["a", ""], &["b", "note"], &["c", ""]],
    );
    let mut table = app.session().open_table(REGION).unwrap();

    table.set_filter("Comment", FilterType::IsBlank, "").await.unwrap();
    assert_eq!(table.column_values("Name").await.unwrap(), vec!["a", "c"]);

    table.clear_filter("Comment").await.unwrap();
    assert_eq!(table.row_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_sort_reorders_rows() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    table.set_sort("DisplayName", SortDirection::Descending).await.unwrap();
    assert_eq!(
        table.column_values("DisplayName").await.unwrap(),
        vec!["Charlie", "Bravo", "Alpha"]
    );

    table.set_sort("Status", SortDirection::Ascending).await.unwrap();
    assert_eq!(table.data_as_text_by_column(0, "Status").await.unwrap(), "COMPLETE");
    assert_eq!(table.data_as_text_by_column(2, "Status").await.unwrap(), "ERROR");

    table.clear_sort("Status").await.unwrap();
    assert_eq!(table.column_values("RowId").await.unwrap(), vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_paging_moves_through_pages() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    table.set_page_size(2).await.unwrap();
    assert_eq!(table.row_count().await.unwrap(), 2);
    let counts = table.paging_counts().await.unwrap().unwrap();
    assert_eq!(counts, PagingCounts { first: 1, last: 2, total: 3 });
    assert!(!counts.is_last_page());

    table.next_page().await.unwrap();
    assert_eq!(table.row_count().await.unwrap(), 1);
    assert_eq!(table.data_as_text_by_column(0, "DisplayName").await.unwrap(), "Charlie");
    assert!(table.paging_counts().await.unwrap().unwrap().is_last_page());

    table.previous_page().await.unwrap();
    assert_eq!(table.data_as_text_by_column(0, "DisplayName").await.unwrap(), "Alpha");

    table.last_page().await.unwrap();
    assert_eq!(table.paging_counts().await.unwrap().unwrap().first, 3);

    table.first_page().await.unwrap();
    assert_eq!(table.paging_counts().await.unwrap().unwrap().first, 1);

    table.go_to_page(2).await.unwrap();
    assert_eq!(table.row_count().await.unwrap(), 1);
}

/// Toggling a row twice restores its selection state
#[tokio::test]
async fn test_toggle_selection_twice_restores_state() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    assert!(!table.is_row_selected(1).await.unwrap());
    table.toggle_row_selection(1).await.unwrap();
    assert!(table.is_row_selected(1).await.unwrap());
    assert_eq!(table.selected_keys().await.unwrap(), vec!["2"]);

    table.toggle_row_selection(1).await.unwrap();
    assert!(!table.is_row_selected(1).await.unwrap());
    assert!(table.selected_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_select_by_key_is_idempotent() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    table.select_row_by_key("3").await.unwrap();
    let waits = table.signal_waits();
    table.select_row_by_key("3").await.unwrap();

    assert_eq!(table.signal_waits(), waits);
    assert_eq!(table.selected_keys().await.unwrap(), vec!["3"]);
}

#[tokio::test]
async fn test_check_all_then_uncheck_all() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    table.check_all_on_page().await.unwrap();
    assert_eq!(table.selected_keys().await.unwrap(), vec!["1", "2", "3"]);

    let waits = table.signal_waits();
    table.check_all_on_page().await.unwrap();
    assert_eq!(table.signal_waits(), waits);

    table.uncheck_all_on_page().await.unwrap();
    assert!(table.selected_keys().await.unwrap().is_empty());
}

/// One obscured click is retried after scrolling
#[tokio::test]
async fn test_selection_recovers_from_one_interception() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    let checkbox = app.checkbox("1");
    app.dom().intercept_clicks(&checkbox, 1).unwrap();

    table.toggle_row_selection(0).await.unwrap();
    assert!(table.is_row_selected(0).await.unwrap());
    assert_eq!(app.dom().scrolls(), vec![checkbox]);
}

#[tokio::test]
async fn test_selection_second_interception_propagates() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    let checkbox = app.checkbox("1");
    app.dom().intercept_clicks(&checkbox, 2).unwrap();

    let err = table.toggle_row_selection(0).await.unwrap_err();
    assert!(err.is_click_intercepted());
    assert!(!table.is_row_selected(0).await.unwrap());
}

#[tokio::test]
async fn test_insert_row() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    table
        .insert_row(&[("RowId", "4"), ("DisplayName", "Delta"), ("Status", "NEW")])
        .await
        .unwrap();

    assert_eq!(table.row_count().await.unwrap(), 4);
    let row = table.row_index("DisplayName", "Delta").await.unwrap();
    assert_eq!(row, 3);
    assert_eq!(table.data_as_text_by_column(3, "Status").await.unwrap(), "NEW");
    assert!(app.dom().select(".region-insert-form").unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_selected_rows() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    table.select_row_by_key("2").await.unwrap();
    table.delete_rows().await.unwrap();

    assert_eq!(table.row_count().await.unwrap(), 2);
    assert_eq!(table.column_values("DisplayName").await.unwrap(), vec!["Alpha", "Charlie"]);
    assert!(table.selected_keys().await.unwrap().is_empty());
}

/// A re-rendered root is re-resolved and the stale cell value is not returned
#[tokio::test]
async fn test_detached_root_reresolves_and_resets_epoch() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    assert_eq!(table.data_as_text_by_column(1, "Status").await.unwrap(), "ERROR");
    let epoch = table.epoch();
    let root_before = app.table_node().unwrap();

    app.set_value("2", "Status", "FAILED");
    app.rerender();
    assert!(!app.dom().attached(&root_before));

    assert_eq!(table.data_as_text_by_column(1, "Status").await.unwrap(), "FAILED");
    assert!(table.epoch() > epoch);
    assert_eq!(table.root().re_resolutions(), 1);
}

/// A re-render landing between two cell reads restarts the read
#[tokio::test]
async fn test_read_retries_after_mid_read_render() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();
    table.columns().await.unwrap();
    let epoch = table.epoch();
    let renders = app.renders();

    // Render once, right after the second data cell has been read
    let base = app.dom().text_reads();
    let page = app.clone();
    app.dom().on_text_read(move |dom, node, reads| {
        if reads == base + 2 && dom.closest_with_attr(node, "data-column").is_none() {
            page.set_value("1", "DisplayName", "Alfa");
            page.rerender();
        }
    });

    assert_eq!(
        table.column_values("DisplayName").await.unwrap(),
        vec!["Alfa", "Bravo", "Charlie"]
    );
    assert_eq!(app.renders(), renders + 1);
    assert!(table.epoch() > epoch);
    assert_eq!(table.root().re_resolutions(), 1);
}

/// A region that re-renders on every cell read never settles
#[tokio::test]
async fn test_read_gives_up_when_region_never_settles() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();

    let page = app.clone();
    app.dom().on_text_read(move |dom, node, _| {
        if dom.closest_with_attr(node, "data-column").is_none() {
            page.rerender();
        }
    });

    let err = table.column_values("DisplayName").await.unwrap_err();
    assert!(matches!(err, Error::StaleRecoveryFailure(_)));
    assert!(err.to_string().contains("3 attempts"));
}

/// Selector header carrying only the select-all checkbox still shifts cells
#[tokio::test]
async fn test_selector_header_without_column_attribute() {
    let app = FakeRegion::jobs();
    app.set_bare_selector_header(true);
    let mut table = app.session().open_table(REGION).unwrap();

    assert_eq!(
        table.column_names().await.unwrap(),
        vec!["RowId", "DisplayName", "Status"]
    );
    assert_eq!(table.data_as_text(0, 1).await.unwrap(), "Alpha");
    assert_eq!(table.row_data_as_text(1).await.unwrap(), vec!["2", "Bravo", "ERROR"]);

    table.check_all_on_page().await.unwrap();
    assert_eq!(table.selected_keys().await.unwrap(), vec!["1", "2", "3"]);
}

/// Header controls are found by the attribute as rendered, whatever its prefix
#[tokio::test]
async fn test_header_actions_with_schema_prefixed_attributes() {
    let app = FakeRegion::jobs();
    app.set_column_prefix("lists.jobs");
    let mut table = app.session().open_table(REGION).unwrap();

    assert_eq!(table.column_index("DisplayName").await.unwrap(), 1);
    let columns = table.columns().await.unwrap();
    assert_eq!(columns[1].attribute.as_deref(), Some("lists.jobs:DisplayName"));

    table.set_sort("DisplayName", SortDirection::Descending).await.unwrap();
    assert_eq!(
        table.column_values("DisplayName").await.unwrap(),
        vec!["Charlie", "Bravo", "Alpha"]
    );

    table.set_filter("Status", FilterType::Equal, "ERROR").await.unwrap();
    assert_eq!(table.column_values("DisplayName").await.unwrap(), vec!["Bravo"]);
}

/// A trigger the page never acknowledges fails within the update timeout
#[tokio::test]
async fn test_silent_update_times_out() {
    let app = FakeRegion::jobs();
    let session = app.session();
    let timeout = session.config().update_timeout();
    let mut table = session.open_table(REGION).unwrap();
    table.columns().await.unwrap();

    app.set_silent(true);
    let started = Instant::now();
    let result = table.set_sort("Status", SortDirection::Ascending).await;

    assert!(matches!(result, Err(Error::Timeout(_))));
    assert!(started.elapsed() >= timeout);
    assert!(started.elapsed() < timeout + Duration::from_millis(400));
}

#[tokio::test]
async fn test_missing_column_mutation_is_not_found() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table(REGION).unwrap();
    let renders = app.renders();

    let result = table.set_sort("Missing", SortDirection::Ascending).await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(table.signal_waits(), 0);
    assert_eq!(app.renders(), renders);
}

/// One navigation invalidates every open table exactly once
#[tokio::test]
async fn test_navigation_invalidates_each_table_once() {
    let app = FakeRegion::jobs();
    let session = app.session();
    let mut first = session.open_table(REGION).unwrap();
    let mut second = session.open_table(REGION).unwrap();
    assert_eq!(session.lifecycle().subscriber_count(), 2);

    first.row_count().await.unwrap();
    second.row_count().await.unwrap();
    let (e1, e2) = (first.epoch(), second.epoch());

    session.navigate("http://localhost/jobs?page=2").await.unwrap();

    assert_eq!(first.row_count().await.unwrap(), 3);
    assert_eq!(second.row_count().await.unwrap(), 3);
    assert_eq!(first.epoch(), e1 + 1);
    assert_eq!(second.epoch(), e2 + 1);

    drop(second);
    assert_eq!(session.lifecycle().subscriber_count(), 1);
}

#[tokio::test]
async fn test_open_by_root_handle() {
    let app = FakeRegion::jobs();
    let session = app.session();
    let root = Arc::new(session.handle(Locator::css("table")));
    let mut table = session.open_table(root).unwrap();

    assert_eq!(table.region_name().await.unwrap(), REGION);
    assert_eq!(table.row_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_missing_region_is_not_found() {
    let app = FakeRegion::jobs();
    let mut table = app.session().open_table("nope").unwrap();

    assert!(matches!(table.row_count().await, Err(Error::NotFound(_))));
}
