use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;

use crate::color::ColorMap;
use crate::config::{DashboardConfig, MAX_LOOKBACK_WEEKS, PLAYBACK_STEP_MS};
use crate::data::loader::{self, LoadOutcome};
use crate::data::model::CotTable;
use crate::data::schema::Field;
use crate::view::{
    bubble_view, combined_view, extremes_view, market_detail_view, open_interest_view,
    BubblePoint, CombinedView, ExtremeRecord, MarketDetailView, Selection, Series,
};

// ---------------------------------------------------------------------------
// Computed views
// ---------------------------------------------------------------------------

/// Everything the panels draw, rebuilt from scratch on each selection change.
#[derive(Debug, Clone, Default)]
pub struct Views {
    pub bubbles: Vec<BubblePoint>,
    pub open_interest: Vec<Series>,
    pub combined: CombinedView,
    pub detail: Option<MarketDetailView>,
    pub extremes: Vec<ExtremeRecord>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: DashboardConfig,

    /// Loaded table, shared read-only. Empty until a load succeeds.
    pub table: Arc<CotTable>,

    /// Whether the current table came from a successful load.
    pub loaded: bool,

    /// Path of the last load attempt.
    pub source: Option<PathBuf>,

    /// Current filter controls.
    pub selection: Selection,

    /// Market → colour, shared by every time series.
    pub market_colors: ColorMap,

    /// Bubble category → colour.
    pub category_colors: ColorMap,

    /// Views for the current selection.
    pub views: Views,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Whether the bubble chart is stepping through report dates.
    pub playing: bool,
    last_step: Option<Instant>,
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            table: Arc::new(CotTable::default()),
            loaded: false,
            source: None,
            selection: Selection::default(),
            market_colors: ColorMap::new(std::iter::empty()),
            category_colors: ColorMap::new(std::iter::empty()),
            views: Views::default(),
            status_message: None,
            playing: false,
            last_step: None,
        }
    }

    /// Load a source file, replacing the current table on success. A failed
    /// load leaves the dashboard in its error state with an empty table.
    pub fn load_path(&mut self, path: &Path) {
        self.source = Some(path.to_path_buf());
        let outcome = loader::load(path, &self.config.loader);
        self.apply_outcome(outcome);
    }

    pub fn apply_outcome(&mut self, outcome: LoadOutcome) {
        self.loaded = outcome.loaded;
        self.status_message = outcome.error.map(|e| format!("Error: {e}"));
        self.set_table(outcome.table);
    }

    /// Ingest a table, initialise the selection and colours.
    pub fn set_table(&mut self, table: Arc<CotTable>) {
        self.market_colors = ColorMap::new(table.markets().iter().map(String::as_str));
        self.category_colors = if table.has_field(Field::Group) {
            ColorMap::new(table.rows().iter().filter_map(|r| r.group.as_deref()))
        } else {
            self.market_colors.clone()
        };

        let mut selected: Vec<String> = self
            .config
            .default_markets
            .iter()
            .filter(|m| table.contains_market(m))
            .cloned()
            .collect();
        if selected.is_empty() {
            selected = table.markets().iter().take(3).cloned().collect();
        }

        self.selection = Selection {
            as_of_date: table.latest_date(),
            lookback_weeks: self.config.lookback_weeks.min(MAX_LOOKBACK_WEEKS),
            focus_market: selected.first().cloned(),
            selected_markets: selected,
        };
        self.playing = false;
        self.last_step = None;
        self.table = table;

        log::debug!(
            "Dashboard ready: {} rows, as of {:?}, markets {:?}",
            self.table.len(),
            self.selection.as_of_date,
            self.selection.selected_markets
        );
        self.refresh();
    }

    /// Recompute every view for the current selection.
    pub fn refresh(&mut self) {
        let table = &self.table;
        let sel = &self.selection;
        self.views = Views {
            bubbles: bubble_view(table, sel, &self.category_colors),
            open_interest: open_interest_view(table, sel, &self.market_colors),
            combined: combined_view(table, sel, &self.market_colors),
            detail: market_detail_view(table, sel, &self.market_colors),
            extremes: extremes_view(table, self.config.thresholds),
        };
    }

    // -- Selection changes --

    /// Select a report date, clamped to the table's first and latest dates.
    pub fn set_as_of(&mut self, date: NaiveDate) {
        let date = match (self.table.first_date(), self.table.latest_date()) {
            (Some(first), Some(latest)) => date.clamp(first, latest),
            _ => date,
        };
        if self.selection.as_of_date != Some(date) {
            self.selection.as_of_date = Some(date);
            self.refresh();
        }
    }

    pub fn set_lookback(&mut self, weeks: u32) {
        let weeks = weeks.min(MAX_LOOKBACK_WEEKS);
        if self.selection.lookback_weeks != weeks {
            self.selection.lookback_weeks = weeks;
            self.refresh();
        }
    }

    /// Add or remove a market from the time series selection. Added markets
    /// go to the end so the legend keeps the order they were picked in.
    pub fn toggle_market(&mut self, market: &str) {
        let selected = &mut self.selection.selected_markets;
        if let Some(pos) = selected.iter().position(|m| m == market) {
            selected.remove(pos);
        } else {
            selected.push(market.to_string());
        }
        self.refresh();
    }

    pub fn select_all_markets(&mut self) {
        self.selection.selected_markets = self.table.markets().to_vec();
        self.refresh();
    }

    pub fn select_no_markets(&mut self) {
        self.selection.selected_markets.clear();
        self.refresh();
    }

    pub fn set_focus_market(&mut self, market: &str) {
        self.selection.focus_market = Some(market.to_string());
        self.refresh();
    }

    // -- Report date stepping --

    /// Move to the first report date after the current one.
    /// Returns `false` when already at (or past) the last date.
    pub fn step_forward(&mut self) -> bool {
        let dates = self.table.dates();
        let next = match self.selection.as_of_date {
            Some(current) => dates.iter().copied().find(|d| *d > current),
            None => dates.first().copied(),
        };
        match next {
            Some(date) => {
                self.set_as_of(date);
                true
            }
            None => false,
        }
    }

    /// Move to the last report date before the current one.
    pub fn step_back(&mut self) -> bool {
        let Some(current) = self.selection.as_of_date else {
            return false;
        };
        match self.table.dates().iter().rev().copied().find(|d| *d < current) {
            Some(date) => {
                self.set_as_of(date);
                true
            }
            None => false,
        }
    }

    pub fn snap_to_latest(&mut self) {
        if let Some(latest) = self.table.latest_date() {
            self.set_as_of(latest);
        }
    }

    // -- Playback --

    /// Start playing from the first report date, or stop.
    pub fn toggle_playback(&mut self) {
        if self.playing {
            self.playing = false;
            return;
        }
        if self.table.is_empty() {
            return;
        }
        if self.selection.as_of_date >= self.table.latest_date() {
            if let Some(first) = self.table.first_date() {
                self.set_as_of(first);
            }
        }
        self.playing = true;
        self.last_step = None;
    }

    /// Advance playback when a step interval has elapsed. Returns whether the
    /// selection changed.
    pub fn tick_playback(&mut self, now: Instant) -> bool {
        if !self.playing {
            return false;
        }
        let due = self
            .last_step
            .map_or(true, |t| now.duration_since(t) >= playback_step());
        if !due {
            return false;
        }
        self.last_step = Some(now);
        let advanced = self.step_forward();
        if !advanced {
            self.playing = false;
        }
        advanced
    }
}

pub fn playback_step() -> Duration {
    Duration::from_millis(PLAYBACK_STEP_MS)
}
