// src/state.rs

use tokio::time::{Duration, Instant};

use crate::types::{Config, Percent, ScaleDirection};

/// Minimum spacing between two "cooldown active" log lines
pub const COOLDOWN_LOG_THROTTLE: Duration = Duration::from_secs(10);

/// Counts consecutive qualifying scale-down ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HysteresisCounter {
    count: u32,
    required: u32,
}

impl HysteresisCounter {
    pub fn new(required: u32) -> Self {
        Self {
            count: 0,
            required: required.max(1),
        }
    }

    /// Record one qualifying tick, returning true once the streak is long enough
    pub fn record(&mut self) -> bool {
        self.count = self.count.saturating_add(1);
        self.count >= self.required
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn required(&self) -> u32 {
        self.required
    }
}

/// Mutable controller state, owned by the control loop
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub last_scale_event: Option<Instant>,
    pub last_scale_direction: Option<ScaleDirection>,
    pub scale_down_checks: HysteresisCounter,
    pub last_log: Option<Instant>,
    pub last_logged_replicas: Option<usize>,
    pub last_logged_cpu: Option<Percent>,
    pub last_logged_mem: Option<Percent>,
}

impl ControllerState {
    pub fn new(config: &Config) -> Self {
        Self {
            last_scale_event: None,
            last_scale_direction: None,
            scale_down_checks: HysteresisCounter::new(config.scale_down_checks),
            last_log: None,
            last_logged_replicas: None,
            last_logged_cpu: None,
            last_logged_mem: None,
        }
    }

    /// Time left before another scale action is allowed, if any
    pub fn cooldown_remaining(&self, config: &Config, now: Instant) -> Option<Duration> {
        let cooldown = config.cooldown_for(self.last_scale_direction);
        if cooldown.is_zero() {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.last_scale_event?);
        if elapsed < cooldown {
            Some(cooldown - elapsed)
        } else {
            None
        }
    }

    /// Whether at least `interval` passed since the last log line
    pub fn log_due(&self, now: Instant, interval: Duration) -> bool {
        self.last_log
            .map_or(true, |last| now.saturating_duration_since(last) >= interval)
    }

    /// Record a successful scale action, starting its cooldown
    pub fn record_scale_action(&mut self, direction: ScaleDirection, now: Instant) {
        self.last_scale_event = Some(now);
        self.last_scale_direction = Some(direction);
    }

    /// Whether the readings differ from the last heartbeat
    pub fn heartbeat_changed(&self, replicas: usize, cpu: Option<Percent>, mem: Option<Percent>) -> bool {
        self.last_logged_replicas != Some(replicas)
            || self.last_logged_cpu != cpu
            || self.last_logged_mem != mem
    }

    pub fn record_heartbeat(
        &mut self,
        replicas: usize,
        cpu: Option<Percent>,
        mem: Option<Percent>,
        now: Instant,
    ) {
        self.last_log = Some(now);
        self.last_logged_replicas = Some(replicas);
        self.last_logged_cpu = cpu;
        self.last_logged_mem = mem;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::builder()
            .cooldowns(Duration::from_secs(30), Duration::from_secs(60))
            .scale_down_checks(2)
            .build()
    }

    #[test]
    fn hysteresis_counts_to_required() {
        let mut counter = HysteresisCounter::new(2);
        assert!(!counter.record());
        assert!(counter.record());
        counter.reset();
        assert_eq!(counter.count(), 0);
        assert!(!counter.record());
    }

    #[test]
    fn hysteresis_requires_at_least_one_check() {
        let mut counter = HysteresisCounter::new(0);
        assert_eq!(counter.required(), 1);
        assert!(counter.record());
    }

    #[test]
    fn no_cooldown_before_first_scale() {
        let cfg = config();
        let state = ControllerState::new(&cfg);
        assert_eq!(state.cooldown_remaining(&cfg, Instant::now()), None);
    }

    #[test]
    fn cooldown_depends_on_last_direction() {
        let cfg = config();
        let mut state = ControllerState::new(&cfg);
        let start = Instant::now();

        state.record_scale_action(ScaleDirection::Up, start);
        assert_eq!(
            state.cooldown_remaining(&cfg, start + Duration::from_secs(10)),
            Some(Duration::from_secs(20))
        );
        assert_eq!(state.cooldown_remaining(&cfg, start + Duration::from_secs(30)), None);

        state.record_scale_action(ScaleDirection::Down, start);
        assert_eq!(
            state.cooldown_remaining(&cfg, start + Duration::from_secs(30)),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn heartbeat_tracks_changes() {
        let cfg = config();
        let mut state = ControllerState::new(&cfg);
        let now = Instant::now();
        assert!(state.heartbeat_changed(1, Some(10.0), None));
        state.record_heartbeat(1, Some(10.0), None, now);
        assert!(!state.heartbeat_changed(1, Some(10.0), None));
        assert!(state.heartbeat_changed(2, Some(10.0), None));
        assert!(!state.log_due(now, Duration::from_secs(30)));
        assert!(state.log_due(now + Duration::from_secs(30), Duration::from_secs(30)));
    }
}
