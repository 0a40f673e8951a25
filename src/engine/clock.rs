use crate::domain::PricePoint;

use super::series::PriceSeriesStore;
use super::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    #[default]
    Idle,
    Running,
}

/// Outcome of a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// The cursor moved; carries the point that becomes the current rate.
    Advanced(PricePoint),
    /// The series is exhausted; the clock went back to Idle.
    Halted,
    /// The clock was not running; nothing changed.
    Skipped,
}

/// Cursor over the price series plus the Idle/Running state machine.
///
/// The cursor stays within `[initial_window, len]` and never decreases
/// except through `rewind`.
#[derive(Debug, Clone)]
pub struct ReplayClock {
    state: ClockState,
    cursor: usize,
    initial_window: usize,
}

impl ReplayClock {
    pub fn new(initial_window: usize) -> Self {
        Self {
            state: ClockState::Idle,
            cursor: initial_window,
            initial_window,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether `start` would transition to Running.
    ///
    /// The cursor is at the end once no further tick can advance it.
    pub fn can_start(&self, series: &PriceSeriesStore) -> bool {
        !self.is_running() && series.is_ready() && self.cursor + 1 < series.len()
    }

    /// Idle -> Running. Returns `Ok(false)` when already running or when the
    /// cursor is at the end of the series.
    pub fn start(&mut self, series: &PriceSeriesStore) -> Result<bool, SessionError> {
        if !series.is_ready() {
            return Err(SessionError::InsufficientData {
                required: series.initial_window(),
                available: series.len(),
            });
        }
        if !self.can_start(series) {
            return Ok(false);
        }
        self.state = ClockState::Running;
        Ok(true)
    }

    /// Advance the cursor by one point.
    ///
    /// The tick that would move the cursor to the end of the series is
    /// discarded and stops the clock instead.
    pub fn tick(&mut self, series: &mut PriceSeriesStore) -> Tick {
        if !self.is_running() {
            return Tick::Skipped;
        }

        let next = self.cursor + 1;
        if next >= series.len() {
            self.state = ClockState::Idle;
            return Tick::Halted;
        }

        let Some(point) = series.get(self.cursor).cloned() else {
            self.state = ClockState::Idle;
            return Tick::Halted;
        };
        self.cursor = next;
        series.reveal_to(next);
        Tick::Advanced(point)
    }

    /// Running -> Idle. Returns whether a transition happened, so callers
    /// cancel their timer at most once.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.state = ClockState::Idle;
        true
    }

    /// Stop, move the cursor back to the initial window and shrink the
    /// revealed prefix to match.
    pub(crate) fn rewind(&mut self, series: &mut PriceSeriesStore) {
        self.stop();
        self.cursor = self.initial_window;
        series.reset_to_initial();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Decimal;
    use chrono::{Duration, NaiveDate};

    fn store(len: usize, window: usize) -> PriceSeriesStore {
        let start = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let points = (0..len)
            .map(|i| {
                let px = Decimal::from_units(i as u64);
                PricePoint::new(start + Duration::days(i as i64), px, px, px, px)
            })
            .collect();
        let mut store = PriceSeriesStore::new(window);
        let _ = store.load(points);
        store
    }

    #[test]
    fn test_tick_emits_point_at_pre_increment_cursor() {
        let mut series = store(6, 3);
        let mut clock = ReplayClock::new(3);
        assert!(clock.start(&series).unwrap());

        match clock.tick(&mut series) {
            Tick::Advanced(point) => assert_eq!(point.close, Decimal::from_units(3)),
            other => panic!("expected Advanced, got {:?}", other),
        }
        assert_eq!(clock.cursor(), 4);
        assert_eq!(series.revealed_prefix().len(), 4);
    }

    #[test]
    fn test_auto_stop_at_end_of_series() {
        let mut series = store(4005, 4000);
        let mut clock = ReplayClock::new(4000);
        clock.start(&series).unwrap();

        let mut emitted = Vec::new();
        for _ in 0..5 {
            let before = clock.cursor();
            if let Tick::Advanced(point) = clock.tick(&mut series) {
                emitted.push(point);
            }
            assert!(clock.cursor() >= before);
            assert!(clock.cursor() <= series.len());
        }

        assert_eq!(emitted.len(), 4);
        assert_eq!(clock.state(), ClockState::Idle);
        assert_eq!(clock.cursor(), 4004);
        assert_eq!(clock.tick(&mut series), Tick::Skipped);
        assert_eq!(clock.cursor(), 4004);
    }

    #[test]
    fn test_start_is_noop_when_running_or_exhausted() {
        let mut series = store(5, 3);
        let mut clock = ReplayClock::new(3);
        assert!(clock.start(&series).unwrap());
        assert!(!clock.start(&series).unwrap());

        clock.tick(&mut series);
        assert_eq!(clock.tick(&mut series), Tick::Halted);
        assert_eq!(clock.cursor(), 4);
        assert!(!clock.start(&series).unwrap());
        assert_eq!(clock.tick(&mut series), Tick::Skipped);
    }

    #[test]
    fn test_start_refused_without_sufficient_data() {
        let series = store(2, 3);
        let mut clock = ReplayClock::new(3);
        assert!(matches!(
            clock.start(&series),
            Err(SessionError::InsufficientData { required: 3, available: 2 })
        ));
        assert_eq!(clock.state(), ClockState::Idle);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let series = store(10, 3);
        let mut clock = ReplayClock::new(3);
        clock.start(&series).unwrap();

        assert!(clock.stop());
        assert!(!clock.stop());
        assert_eq!(clock.state(), ClockState::Idle);
    }

    #[test]
    fn test_rewind_restores_initial_window() {
        let mut series = store(10, 3);
        let mut clock = ReplayClock::new(3);
        clock.start(&series).unwrap();
        for _ in 0..4 {
            clock.tick(&mut series);
        }
        assert_eq!(clock.cursor(), 7);

        clock.rewind(&mut series);
        assert_eq!(clock.cursor(), 3);
        assert_eq!(clock.state(), ClockState::Idle);
        assert_eq!(series.revealed_prefix().len(), 3);
    }
}
