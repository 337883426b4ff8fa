//! Market watch command-line entry point
//!
//! Loads persisted settings, fetches one snapshot (HTTP by default, a
//! capture file when a path is given on the command line), replays the
//! saved filter pipeline over it, prints the summary panel figures to
//! the log, exports the current view as CSV, and writes the runtime
//! log back to the settings file.

mod refresh;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use mw_data::settings::{DEFAULT_EXPORT_NAME, SETTINGS_FILE};
use mw_data::{ColumnRoles, FeedSource, FileFeedSource, HttpFeedSource, SettingsStore};
use mw_view::{export_csv, summarize};

use refresh::{SnapshotFetcher, TabState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let mut store = SettingsStore::load(SETTINGS_FILE);

    // `marketwatch [--special] [snapshot-file]`
    let mut special = false;
    let mut snapshot_path = None;
    for arg in std::env::args().skip(1) {
        if arg == "--special" {
            special = true;
        } else {
            snapshot_path = Some(arg);
        }
    }

    let source: Arc<dyn FeedSource> = match snapshot_path {
        Some(path) => Arc::new(FileFeedSource::new(path)),
        None => Arc::new(HttpFeedSource::new(store.settings.data_url.clone())?),
    };
    info!(source = source.source_name(), "fetching market snapshot");

    let fetcher = SnapshotFetcher::new(Arc::clone(&source));
    let receiver = fetcher.request().context("fetch already in flight")?;
    let outcome = receiver.await.context("fetch worker dropped")??;

    let mut tab = TabState::new(ColumnRoles::default(), &store.settings);
    tab.install_snapshot(&outcome.raw);
    if special {
        tab.apply_special_preset()?;
        // Mutating the filter list persists immediately, not just at
        // shutdown.
        tab.store_into(&mut store.settings);
        store.save();
    }
    info!(
        rows = tab.view.row_count(),
        columns = tab.view.column_count(),
        elapsed_secs = outcome.elapsed.as_secs_f64(),
        "snapshot installed"
    );

    for summary in summarize(
        &tab.view,
        store.settings.bottom_visible_columns.as_deref(),
    ) {
        if summary.count == 0 {
            continue;
        }
        info!(
            column = %summary.column,
            count = summary.count,
            sum = summary.sum,
            mean = summary.mean,
            median = summary.median,
            robust_median = summary.robust_median,
            "column summary"
        );
    }

    let rows = export_csv(&tab.view, DEFAULT_EXPORT_NAME)?;

    store
        .settings
        .runtime_log
        .record_fetch(outcome.elapsed.as_secs_f64());
    store.settings.runtime_log.rows_shown = Some(rows);
    tab.store_into(&mut store.settings);
    store.save();

    Ok(())
}
