use crate::domain::{Decimal, PricePoint};

use super::SessionError;

/// Whether the loaded series can drive a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// Nothing loaded yet.
    #[default]
    Loading,
    /// At least the initial window is available.
    Ready,
    /// The last load was rejected (too short or unordered).
    Unavailable,
}

/// Holds the full historical series and how much of it is revealed.
#[derive(Debug, Clone)]
pub struct PriceSeriesStore {
    series: Vec<PricePoint>,
    revealed: usize,
    initial_window: usize,
    load_state: LoadState,
}

impl PriceSeriesStore {
    pub fn new(initial_window: usize) -> Self {
        Self {
            series: Vec::new(),
            revealed: 0,
            initial_window,
            load_state: LoadState::Loading,
        }
    }

    /// Replace the series and reveal the initial window.
    ///
    /// A series shorter than the initial window is still kept for display,
    /// but is reported as `InsufficientData` and never becomes ready.
    pub fn load(&mut self, series: Vec<PricePoint>) -> Result<(), SessionError> {
        if let Some(index) = first_unordered(&series) {
            self.series.clear();
            self.revealed = 0;
            self.load_state = LoadState::Unavailable;
            return Err(SessionError::OutOfOrder { index });
        }

        self.series = series;
        self.revealed = self.initial_window.min(self.series.len());

        if self.series.len() < self.initial_window || self.series.is_empty() {
            self.load_state = LoadState::Unavailable;
            return Err(SessionError::InsufficientData {
                required: self.initial_window,
                available: self.series.len(),
            });
        }

        self.load_state = LoadState::Ready;
        Ok(())
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_ready(&self) -> bool {
        self.load_state == LoadState::Ready
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn initial_window(&self) -> usize {
        self.initial_window
    }

    pub fn get(&self, index: usize) -> Option<&PricePoint> {
        self.series.get(index)
    }

    /// Points `[0, cursor)`, clamped to the series length.
    pub fn prefix(&self, cursor: usize) -> &[PricePoint] {
        &self.series[..cursor.min(self.series.len())]
    }

    /// The prefix currently exposed to the chart.
    pub fn revealed_prefix(&self) -> &[PricePoint] {
        self.prefix(self.revealed)
    }

    pub(crate) fn reveal_to(&mut self, cursor: usize) {
        self.revealed = cursor.min(self.series.len());
    }

    /// Shrink the revealed prefix back to the initial window.
    pub(crate) fn reset_to_initial(&mut self) {
        self.revealed = self.initial_window.min(self.series.len());
    }

    /// Close of the last point in the initial window, if any.
    pub fn initial_rate(&self) -> Option<Decimal> {
        self.prefix(self.initial_window).last().map(|p| p.close)
    }
}

fn first_unordered(series: &[PricePoint]) -> Option<usize> {
    series
        .windows(2)
        .position(|pair| pair[0].date >= pair[1].date)
        .map(|i| i + 1)
}
