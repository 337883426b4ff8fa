//! Refresh orchestration
//!
//! [`TabState`] is the single owner of one tab's tables and engines:
//! base table, filtered view, filter pipeline, sort memory, search
//! index and event bus. Every mutation funnels through it, rebuilds
//! the view, and publishes one event.
//!
//! [`SnapshotFetcher`] runs feed fetches on a worker task with
//! single-flight gating: a request while one is outstanding is
//! ignored rather than queued.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tokio::sync::oneshot;
use tracing::{debug, info};

use mw_core::{sort_table, FilterSpec, PatternMode, SortState, Table, ViewEvent, ViewEventBus};
use mw_data::columns::apply_labels;
use mw_data::settings::Settings;
use mw_data::{build_base_table, ColumnRoles, DataError, FeedSource};
use mw_view::{FilterPipeline, SearchIndex, ViewError};

/// Owner of one tab's data and engines.
pub struct TabState {
    roles: ColumnRoles,
    label_overrides: IndexMap<String, String>,
    visibility: HashMap<String, bool>,
    pub base: Table,
    pub view: Table,
    pub filters: FilterPipeline,
    sort_state: SortState,
    active_sort: Option<(String, bool)>,
    pub search: SearchIndex,
    pub events: ViewEventBus,
}

impl TabState {
    /// Build a tab from persisted settings: saved filters are replayed
    /// into the pipeline, rename and visibility maps are applied to
    /// every installed snapshot.
    pub fn new(roles: ColumnRoles, settings: &Settings) -> Self {
        Self {
            roles,
            label_overrides: settings.column_name_map.clone(),
            visibility: settings.visible_columns.clone(),
            base: Table::new(),
            view: Table::new(),
            filters: FilterPipeline::from_specs(settings.saved_filters.iter().cloned()),
            sort_state: SortState::new(),
            active_sort: None,
            search: SearchIndex::new(),
            events: ViewEventBus::new(),
        }
    }

    /// Replace the base table with a freshly parsed snapshot and
    /// rebuild the view through the unchanged pipeline.
    pub fn install_snapshot(&mut self, raw: &str) {
        let mut base = build_base_table(raw, &self.roles);
        apply_labels(&mut base, &self.label_overrides);
        for (key, visible) in &self.visibility {
            if let Some(column) = base.column_mut(key) {
                column.visible = *visible;
            }
        }
        self.base = base;
        debug!(
            rows = self.base.row_count(),
            columns = self.base.column_count(),
            "snapshot parsed"
        );
        self.rebuild_view(true);
    }

    pub fn add_filter(&mut self, spec: FilterSpec) -> Result<(), ViewError> {
        self.filters.add(spec)?;
        self.rebuild_view(false);
        Ok(())
    }

    pub fn toggle_filter(&mut self, index: usize, enabled: bool) -> Result<(), ViewError> {
        self.filters.toggle(index, enabled)?;
        self.rebuild_view(false);
        Ok(())
    }

    pub fn remove_filter(&mut self, index: usize) -> Result<(), ViewError> {
        self.filters.remove(index)?;
        self.rebuild_view(false);
        Ok(())
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.rebuild_view(false);
    }

    /// Append the main-market preset filters and rebuild once.
    pub fn apply_special_preset(&mut self) -> Result<(), ViewError> {
        for spec in special_market_preset() {
            self.filters.add(spec)?;
        }
        self.rebuild_view(false);
        Ok(())
    }

    /// Sort the view by a column, flipping direction on repeat. The
    /// chosen order is reapplied after later filter or snapshot
    /// changes.
    pub fn sort_by(&mut self, column: &str) {
        let ascending = self.sort_state.toggle(column);
        self.active_sort = Some((column.to_string(), ascending));
        sort_table(&mut self.view, column, ascending);
        self.search.set_view(&self.view);
        self.events.publish(&ViewEvent::ViewChanged {
            rows: self.view.row_count(),
        });
    }

    pub fn set_column_visible(&mut self, key: &str, visible: bool) {
        self.visibility.insert(key.to_string(), visible);
        for table in [&mut self.base, &mut self.view] {
            if let Some(column) = table.column_mut(key) {
                column.visible = visible;
            }
        }
    }

    pub fn rename_column(&mut self, key: &str, label: &str) {
        self.label_overrides
            .insert(key.to_string(), label.to_string());
        for table in [&mut self.base, &mut self.view] {
            let _ = table.rename_column(key, label);
        }
    }

    /// Persisted shape of this tab, merged back into settings on exit.
    pub fn store_into(&self, settings: &mut Settings) {
        settings.saved_filters = self.filters.specs();
        settings.column_name_map = self.label_overrides.clone();
        settings.visible_columns = self.visibility.clone();
    }

    fn rebuild_view(&mut self, snapshot: bool) {
        self.view = self.filters.apply(&self.base);
        if let Some((column, ascending)) = &self.active_sort {
            sort_table(&mut self.view, column, *ascending);
        }
        self.search.set_view(&self.view);
        let rows = self.view.row_count();
        let event = if snapshot {
            ViewEvent::SnapshotReplaced { rows }
        } else {
            ViewEvent::ViewChanged { rows }
        };
        self.events.publish(&event);
    }
}

/// The stock-board preset: main-market instruments only. Market codes
/// 300/303/309/313 cover بورس and فرابورس equities; the ISIN suffix
/// `0001` drops rights issues and odd instruments.
pub fn special_market_preset() -> [FilterSpec; 2] {
    [
        FilterSpec::Value {
            column: "کد_بازار".to_string(),
            values: ["300", "303", "309", "313"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude: false,
        },
        FilterSpec::Pattern {
            column: "کد_بین_المللی".to_string(),
            mode: PatternMode::End,
            text: "0001".to_string(),
            length: Some(4),
            exclude: false,
        },
    ]
}

/// Result of one completed fetch.
pub struct FetchOutcome {
    pub raw: String,
    pub elapsed: Duration,
}

/// Single-flight background fetcher over a [`FeedSource`].
pub struct SnapshotFetcher {
    source: Arc<dyn FeedSource>,
    in_flight: Arc<AtomicBool>,
}

impl SnapshotFetcher {
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        Self {
            source,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a fetch on a worker task. Returns `None` when one is
    /// already outstanding; the caller drops the request.
    pub fn request(&self) -> Option<oneshot::Receiver<Result<FetchOutcome, DataError>>> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            info!("fetch already in flight, ignoring request");
            return None;
        }
        let (tx, rx) = oneshot::channel();
        let source = Arc::clone(&self.source);
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            let started = Instant::now();
            let result = source.fetch().await.map(|raw| FetchOutcome {
                raw,
                elapsed: started.elapsed(),
            });
            in_flight.store(false, Ordering::SeqCst);
            let _ = tx.send(result);
        });
        Some(rx)
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mw_core::{PatternMode, Value};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    const RAW: &str = "header@heading2@\
        1001,IRO1X,نماد1,شرکت اول,12:30,100,1000,1010,5,200,2000,990,1020,995,50,1,0,x,27,1050,950,2000000000,300,0,0,0;\
        1002,IRO2X,نماد2,شرکت دوم,12:31,200,2000,2020,6,300,3000,1990,2040,1995,0,1,0,x,34,2100,1900,4000000000,303,0,0,0\
        @1001,1,9,4,1050,1040,100,90;1002,1,3,2,2050,2060,10,20@tail";

    fn tab() -> TabState {
        TabState::new(ColumnRoles::default(), &Settings::default())
    }

    #[test]
    fn install_publishes_and_rebuilds_view() {
        let mut tab = tab();
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let log = Arc::clone(&log);
            tab.events.subscribe(move |e| log.lock().unwrap().push(e.clone()));
        }
        tab.install_snapshot(RAW);
        assert_eq!(tab.view.row_count(), 2);
        assert_eq!(
            log.lock().unwrap().as_slice(),
            &[ViewEvent::SnapshotReplaced { rows: 2 }]
        );
    }

    #[test]
    fn filters_survive_a_snapshot_swap() {
        let mut settings = Settings::default();
        settings.saved_filters.push(FilterSpec::Value {
            column: "کد_بازار".to_string(),
            values: vec!["300".to_string()],
            exclude: false,
        });
        let mut tab = TabState::new(ColumnRoles::default(), &settings);
        tab.install_snapshot(RAW);
        assert_eq!(tab.view.row_count(), 1);
        assert_eq!(tab.view.value(0, "نماد"), Some(&Value::from("نماد1")));

        // Same pipeline, fresh snapshot.
        tab.install_snapshot(RAW);
        assert_eq!(tab.view.row_count(), 1);
    }

    #[test]
    fn filter_ops_republish_the_view() {
        let mut tab = tab();
        tab.install_snapshot(RAW);
        let rows_seen = Arc::new(AtomicUsize::new(usize::MAX));
        {
            let rows_seen = Arc::clone(&rows_seen);
            tab.events.subscribe(move |e| {
                if let ViewEvent::ViewChanged { rows } = e {
                    rows_seen.store(*rows, Ordering::SeqCst);
                }
            });
        }
        tab.add_filter(FilterSpec::Pattern {
            column: "نماد".to_string(),
            mode: PatternMode::Contains,
            text: "نماد2".to_string(),
            length: None,
            exclude: false,
        })
        .unwrap();
        assert_eq!(rows_seen.load(Ordering::SeqCst), 1);
        tab.clear_filters();
        assert_eq!(rows_seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn sort_persists_across_filter_changes() {
        let mut tab = tab();
        tab.install_snapshot(RAW);
        tab.sort_by("قیمت_پایانی");
        tab.sort_by("قیمت_پایانی"); // flip to descending
        assert_eq!(tab.view.value(0, "نماد"), Some(&Value::from("نماد2")));

        tab.clear_filters();
        // Rebuilt view keeps the descending order.
        assert_eq!(tab.view.value(0, "نماد"), Some(&Value::from("نماد2")));
    }

    #[test]
    fn rename_and_visibility_round_trip_into_settings() {
        let mut tab = tab();
        tab.install_snapshot(RAW);
        tab.rename_column("نماد", "Symbol");
        tab.set_column_visible("NAV", false);
        assert_eq!(tab.view.column("نماد").unwrap().label, "Symbol");
        assert!(!tab.view.column("NAV").unwrap().visible);

        let mut settings = Settings::default();
        tab.store_into(&mut settings);
        assert_eq!(
            settings.column_name_map.get("نماد"),
            Some(&"Symbol".to_string())
        );
        assert_eq!(settings.visible_columns.get("NAV"), Some(&false));

        // A rebuilt tab applies both maps to the next snapshot.
        let mut revived = TabState::new(ColumnRoles::default(), &settings);
        revived.install_snapshot(RAW);
        assert_eq!(revived.view.column("نماد").unwrap().label, "Symbol");
        assert!(!revived.view.column("NAV").unwrap().visible);
    }

    #[test]
    fn filters_added_after_construction_are_persisted() {
        let mut tab = tab();
        tab.install_snapshot(RAW);
        tab.add_filter(FilterSpec::Value {
            column: "کد_بازار".to_string(),
            values: vec!["300".to_string()],
            exclude: false,
        })
        .unwrap();

        let mut settings = Settings::default();
        tab.store_into(&mut settings);
        assert_eq!(settings.saved_filters.len(), 1);
        assert!(matches!(
            settings.saved_filters[0],
            FilterSpec::Value { .. }
        ));
    }

    #[test]
    fn special_preset_keeps_main_market_instruments() {
        // IRO1X does not end in 0001; swap in ISINs that do for row 1.
        let raw = RAW.replace("IRO1X", "IRO1FOLD0001");
        let mut tab = tab();
        tab.install_snapshot(&raw);
        tab.apply_special_preset().unwrap();
        assert_eq!(tab.view.row_count(), 1);
        assert_eq!(tab.view.value(0, "نماد"), Some(&Value::from("نماد1")));
    }

    struct SlowSource;

    #[async_trait]
    impl FeedSource for SlowSource {
        async fn fetch(&self) -> Result<String, DataError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(RAW.to_string())
        }

        fn source_name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fetcher_is_single_flight() {
        let fetcher = SnapshotFetcher::new(Arc::new(SlowSource));
        let rx = fetcher.request().unwrap();
        assert!(fetcher.is_in_flight());
        assert!(fetcher.request().is_none());

        let outcome = rx.await.unwrap().unwrap();
        assert!(outcome.raw.contains("نماد1"));
        assert!(!fetcher.is_in_flight());
        assert!(fetcher.request().is_some());
    }
}
