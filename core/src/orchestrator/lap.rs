//! Lap timing and ETA projection

use std::time::Duration;

use tokio::time::Instant;

/// Timing of one completed round
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lap {
    /// Round index
    pub round: usize,
    /// Duration of this round alone
    pub lap_time: Duration,
    /// Sum of all lap times so far
    pub accumulated: Duration,
    /// Projected time until the last round completes; `None` after the last round
    pub eta: Option<Duration>,
}

/// Monotonic clock that turns round end times into laps
///
/// The ETA is a linear extrapolation of the average lap time so far. It is
/// advisory only.
#[derive(Debug)]
pub struct LapClock {
    started: Instant,
    rounds: usize,
    completed: usize,
    last_split: Duration,
    accumulated: Duration,
}

impl LapClock {
    /// Start the clock for a race of `rounds` rounds
    pub fn start(rounds: usize) -> Self {
        Self {
            started: Instant::now(),
            rounds,
            completed: 0,
            last_split: Duration::ZERO,
            accumulated: Duration::ZERO,
        }
    }

    /// Close the current round at the current time
    pub fn lap(&mut self) -> Lap {
        let split = self.started.elapsed();
        self.record(split)
    }

    /// Close the current round given its split (time since the clock started)
    pub fn record(&mut self, split: Duration) -> Lap {
        let lap_time = split.saturating_sub(self.last_split);
        self.last_split = split;
        self.accumulated += lap_time;
        self.completed += 1;

        let remaining = self.rounds.saturating_sub(self.completed);
        let eta = (remaining > 0)
            .then(|| self.accumulated.mul_f64(remaining as f64 / self.completed as f64));

        Lap {
            round: self.completed - 1,
            lap_time,
            accumulated: self.accumulated,
            eta,
        }
    }

    /// Time since the clock started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Format a duration as `HH:MM:SS`, truncating fractional seconds
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
