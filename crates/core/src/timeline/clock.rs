use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond source the race clock is built on.
pub trait Stopwatch: Send {
    /// Milliseconds since the last restart.
    fn elapsed_ms(&self) -> i64;
    fn restart(&mut self);
}

/// Wall-clock stopwatch backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct MonotonicStopwatch {
    started: Instant,
}

impl MonotonicStopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for MonotonicStopwatch {
    fn default() -> Self {
        Self::start()
    }
}

impl Stopwatch for MonotonicStopwatch {
    fn elapsed_ms(&self) -> i64 {
        self.started.elapsed().as_millis() as i64
    }

    fn restart(&mut self) {
        self.started = Instant::now();
    }
}

/// Stopwatch advanced by hand. Clones share the same reading, so a test or
/// a simulated host loop can keep one handle and give the other to the clock.
#[derive(Debug, Clone, Default)]
pub struct ManualStopwatch {
    now_ms: Arc<AtomicI64>,
    origin_ms: Arc<AtomicI64>,
}

impl ManualStopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: i64) {
        self.now_ms.fetch_add(ms.max(0), Ordering::SeqCst);
    }

    pub fn advance_secs(&self, seconds: f32) {
        self.advance_ms((seconds.max(0.0) * 1000.0).round() as i64);
    }
}

impl Stopwatch for ManualStopwatch {
    fn elapsed_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst) - self.origin_ms.load(Ordering::SeqCst)
    }

    fn restart(&mut self) {
        self.origin_ms
            .store(self.now_ms.load(Ordering::SeqCst), Ordering::SeqCst);
    }
}

/// Pause-aware race time accountant.
///
/// True race time is the stopwatch reading minus every closed pause window.
/// While a window is open the reported time stays frozen at the pause mark,
/// so the value is monotonically non-decreasing across pause cycles.
pub struct RaceClock {
    stopwatch: Box<dyn Stopwatch>,
    paused_accumulated_ms: i64,
    pause_mark_ms: Option<i64>,
}

impl RaceClock {
    pub fn new(stopwatch: Box<dyn Stopwatch>) -> Self {
        Self {
            stopwatch,
            paused_accumulated_ms: 0,
            pause_mark_ms: None,
        }
    }

    /// Restarts the stopwatch and forgets earlier pauses.
    pub fn reset(&mut self) {
        self.stopwatch.restart();
        self.paused_accumulated_ms = 0;
        self.pause_mark_ms = None;
    }

    pub fn is_paused(&self) -> bool {
        self.pause_mark_ms.is_some()
    }

    /// # Panics
    /// If a pause window is already open.
    pub fn start_pause_window(&mut self) {
        assert!(
            self.pause_mark_ms.is_none(),
            "start_pause_window called while a pause window is open"
        );
        self.pause_mark_ms = Some(self.stopwatch.elapsed_ms());
    }

    /// # Panics
    /// If no pause window is open.
    pub fn end_pause_window(&mut self) {
        let mark = self
            .pause_mark_ms
            .take()
            .expect("end_pause_window called without a matching start_pause_window");
        self.paused_accumulated_ms += (self.stopwatch.elapsed_ms() - mark).max(0);
    }

    pub fn elapsed_race_ms(&self) -> i64 {
        let reading = self
            .pause_mark_ms
            .unwrap_or_else(|| self.stopwatch.elapsed_ms());
        (reading - self.paused_accumulated_ms).max(0)
    }

    pub fn paused_ms(&self) -> i64 {
        self.paused_accumulated_ms
    }
}

impl std::fmt::Debug for RaceClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RaceClock")
            .field("elapsed_race_ms", &self.elapsed_race_ms())
            .field("paused_accumulated_ms", &self.paused_accumulated_ms)
            .field("pause_mark_ms", &self.pause_mark_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_clock() -> (ManualStopwatch, RaceClock) {
        let watch = ManualStopwatch::new();
        let clock = RaceClock::new(Box::new(watch.clone()));
        (watch, clock)
    }

    #[test]
    fn subtracts_closed_pause_windows() {
        let (watch, mut clock) = manual_clock();
        let mut wall = 0;
        let mut paused = 0;

        for (run, pause) in [(1200, 300), (50, 4000), (700, 1)] {
            watch.advance_ms(run);
            wall += run;
            clock.start_pause_window();
            watch.advance_ms(pause);
            wall += pause;
            paused += pause;
            clock.end_pause_window();
            assert_eq!(clock.elapsed_race_ms(), wall - paused);
        }

        assert_eq!(clock.paused_ms(), paused);
    }

    #[test]
    fn open_window_freezes_reported_time() {
        let (watch, mut clock) = manual_clock();
        watch.advance_ms(2_000);
        clock.start_pause_window();
        watch.advance_ms(10_000);

        assert!(clock.is_paused());
        assert_eq!(clock.elapsed_race_ms(), 2_000);

        clock.end_pause_window();
        watch.advance_ms(500);
        assert_eq!(clock.elapsed_race_ms(), 2_500);
    }

    #[test]
    fn reset_starts_a_fresh_race() {
        let (watch, mut clock) = manual_clock();
        watch.advance_ms(5_000);
        clock.start_pause_window();
        watch.advance_ms(1_000);
        clock.end_pause_window();

        clock.reset();
        assert_eq!(clock.elapsed_race_ms(), 0);
        watch.advance_ms(250);
        assert_eq!(clock.elapsed_race_ms(), 250);
    }

    #[test]
    #[should_panic(expected = "without a matching start_pause_window")]
    fn end_without_start_panics() {
        let (_watch, mut clock) = manual_clock();
        clock.end_pause_window();
    }

    #[test]
    #[should_panic(expected = "while a pause window is open")]
    fn double_start_panics() {
        let (_watch, mut clock) = manual_clock();
        clock.start_pause_window();
        clock.start_pause_window();
    }
}
