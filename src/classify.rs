use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Key codes treated interchangeably as the logical power key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerKey {
    Power,
    Sleep,
    Wakeup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTransition {
    Pressed,
    Released,
}

/// A decoded power-class key event, stamped on receipt with the monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub key: PowerKey,
    pub transition: KeyTransition,
    pub at: Instant,
}

/// Duration classification of a completed press/release cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressClass {
    Short,
    Long,
    /// Duration fell between the two thresholds; deliberately ignored.
    Ignored,
}

/// The two classification cut-offs. `short_max < long_min` is enforced at
/// construction; the gap between them is the dead zone.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    short_max: Duration,
    long_min: Duration,
}

impl Thresholds {
    pub fn new(short_max: Duration, long_min: Duration) -> Result<Self> {
        anyhow::ensure!(
            short_max < long_min,
            "short_max ({short_max:?}) must be below long_min ({long_min:?})"
        );
        Ok(Self { short_max, long_min })
    }

    /// Both comparisons are inclusive: exactly `short_max` is short, exactly
    /// `long_min` is long.
    pub fn classify(&self, duration: Duration) -> PressClass {
        if duration >= self.long_min {
            PressClass::Long
        } else if duration <= self.short_max {
            PressClass::Short
        } else {
            PressClass::Ignored
        }
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Pressed(Instant),
}

/// Single-slot press/release cycle tracker. Only one power-class key is
/// assumed active at a time, so a second down-event re-anchors the press
/// instead of nesting.
pub struct KeyTracker {
    state: State,
    thresholds: Thresholds,
}

impl KeyTracker {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            state: State::Idle,
            thresholds,
        }
    }

    /// Feed one event. Returns the classification when the event completes a
    /// press/release cycle, `None` otherwise.
    pub fn handle(&mut self, event: &KeyEvent) -> Option<PressClass> {
        match (&self.state, event.transition) {
            (_, KeyTransition::Pressed) => {
                // Duplicate down-events from firmware re-anchor the timestamp.
                self.state = State::Pressed(event.at);
                None
            }
            (State::Idle, KeyTransition::Released) => {
                // Release with no matching press, e.g. at startup.
                debug!(key = ?event.key, "unmatched release ignored");
                None
            }
            (State::Pressed(at), KeyTransition::Released) => {
                let duration = event.at.saturating_duration_since(*at);
                self.state = State::Idle;
                let class = self.thresholds.classify(duration);
                debug!(?duration, ?class, "press cycle completed");
                Some(class)
            }
        }
    }
}

/// The external effects a classified press can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAction {
    Wake,
    LogoutPrompt,
    ScreenOff,
}

impl SystemAction {
    pub fn name(self) -> &'static str {
        match self {
            SystemAction::Wake => "wake",
            SystemAction::LogoutPrompt => "logout-prompt",
            SystemAction::ScreenOff => "screen-off",
        }
    }
}

/// Invokes a named external action; success means the invocation completed
/// with a zero exit status.
pub trait ActionRunner {
    fn run(&self, action: SystemAction) -> Result<()>;
}

/// Single synchronous query for the current screen state. Implementations
/// report `false` when the state cannot be determined.
pub trait BrightnessOracle {
    fn screen_off(&self) -> bool;
}

/// Map a completed classification to actions. The oracle is consulted only on
/// the short-press path; long-press actions are attempted independently, so a
/// failure of the first never suppresses the second.
pub fn dispatch(class: PressClass, oracle: &dyn BrightnessOracle, runner: &dyn ActionRunner) {
    match class {
        PressClass::Long => {
            run_logged(runner, SystemAction::Wake);
            run_logged(runner, SystemAction::LogoutPrompt);
        }
        PressClass::Short => {
            if oracle.screen_off() {
                run_logged(runner, SystemAction::Wake);
            } else {
                run_logged(runner, SystemAction::ScreenOff);
            }
        }
        PressClass::Ignored => {
            debug!("duration in dead zone, no action");
        }
    }
}

fn run_logged(runner: &dyn ActionRunner, action: SystemAction) {
    match runner.run(action) {
        Ok(()) => info!(action = action.name(), "action completed"),
        Err(e) => warn!(action = action.name(), error = %e, "action failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    // Thresholds used throughout: short ≤ 700ms, long ≥ 1500ms.
    fn thresholds() -> Thresholds {
        Thresholds::new(Duration::from_millis(700), Duration::from_millis(1500)).unwrap()
    }

    fn press_at(base: Instant, ms: u64) -> KeyEvent {
        KeyEvent {
            key: PowerKey::Power,
            transition: KeyTransition::Pressed,
            at: base + Duration::from_millis(ms),
        }
    }

    fn release_at(base: Instant, ms: u64) -> KeyEvent {
        KeyEvent {
            key: PowerKey::Power,
            transition: KeyTransition::Released,
            at: base + Duration::from_millis(ms),
        }
    }

    /// Records every attempted action; each invocation can be forced to fail.
    struct RecordingRunner {
        attempted: RefCell<Vec<SystemAction>>,
        fail: bool,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                attempted: RefCell::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                attempted: RefCell::new(Vec::new()),
                fail: true,
            }
        }

        fn attempted(&self) -> Vec<SystemAction> {
            self.attempted.borrow().clone()
        }
    }

    impl ActionRunner for RecordingRunner {
        fn run(&self, action: SystemAction) -> Result<()> {
            self.attempted.borrow_mut().push(action);
            if self.fail {
                anyhow::bail!("forced failure");
            }
            Ok(())
        }
    }

    struct FixedOracle(bool);

    impl BrightnessOracle for FixedOracle {
        fn screen_off(&self) -> bool {
            self.0
        }
    }

    // --- classification boundaries ---

    #[test]
    fn exactly_short_max_is_short() {
        assert_eq!(
            thresholds().classify(Duration::from_millis(700)),
            PressClass::Short
        );
    }

    #[test]
    fn exactly_long_min_is_long() {
        assert_eq!(
            thresholds().classify(Duration::from_millis(1500)),
            PressClass::Long
        );
    }

    #[test]
    fn dead_zone_is_the_open_interval() {
        let th = thresholds();
        assert_eq!(th.classify(Duration::from_millis(701)), PressClass::Ignored);
        assert_eq!(th.classify(Duration::from_millis(1000)), PressClass::Ignored);
        assert_eq!(th.classify(Duration::from_millis(1499)), PressClass::Ignored);
    }

    #[test]
    fn zero_duration_is_short() {
        assert_eq!(thresholds().classify(Duration::ZERO), PressClass::Short);
    }

    #[test]
    fn very_long_duration_is_long() {
        assert_eq!(
            thresholds().classify(Duration::from_secs(60)),
            PressClass::Long
        );
    }

    #[test]
    fn thresholds_reject_inverted_order() {
        assert!(Thresholds::new(Duration::from_millis(1500), Duration::from_millis(700)).is_err());
    }

    #[test]
    fn thresholds_reject_equal_values() {
        assert!(Thresholds::new(Duration::from_millis(700), Duration::from_millis(700)).is_err());
    }

    // --- tracker state transitions ---

    #[test]
    fn press_then_short_release_classifies_short() {
        let base = Instant::now();
        let mut tracker = KeyTracker::new(thresholds());
        assert_eq!(tracker.handle(&press_at(base, 0)), None);
        assert_eq!(
            tracker.handle(&release_at(base, 400)),
            Some(PressClass::Short)
        );
    }

    #[test]
    fn press_then_long_release_classifies_long() {
        let base = Instant::now();
        let mut tracker = KeyTracker::new(thresholds());
        tracker.handle(&press_at(base, 0));
        assert_eq!(
            tracker.handle(&release_at(base, 2000)),
            Some(PressClass::Long)
        );
    }

    #[test]
    fn press_then_dead_zone_release_classifies_ignored() {
        let base = Instant::now();
        let mut tracker = KeyTracker::new(thresholds());
        tracker.handle(&press_at(base, 0));
        assert_eq!(
            tracker.handle(&release_at(base, 1000)),
            Some(PressClass::Ignored)
        );
    }

    #[test]
    fn release_without_press_is_a_noop() {
        let base = Instant::now();
        let mut tracker = KeyTracker::new(thresholds());
        assert_eq!(tracker.handle(&release_at(base, 100)), None);
        // State must still be idle: the next cycle works normally.
        tracker.handle(&press_at(base, 200));
        assert_eq!(
            tracker.handle(&release_at(base, 400)),
            Some(PressClass::Short)
        );
    }

    #[test]
    fn second_press_re_anchors_the_timestamp() {
        let base = Instant::now();
        let mut tracker = KeyTracker::new(thresholds());
        tracker.handle(&press_at(base, 0));
        // Spurious repeat down-event 1200ms in: duration now measured from here.
        tracker.handle(&press_at(base, 1200));
        assert_eq!(
            tracker.handle(&release_at(base, 1600)),
            Some(PressClass::Short)
        );
    }

    #[test]
    fn cycle_returns_to_idle_after_release() {
        let base = Instant::now();
        let mut tracker = KeyTracker::new(thresholds());
        tracker.handle(&press_at(base, 0));
        tracker.handle(&release_at(base, 2000));
        // A lone release afterwards must be ignored again.
        assert_eq!(tracker.handle(&release_at(base, 2100)), None);
    }

    #[test]
    fn sleep_and_wakeup_keys_share_the_press_slot() {
        let base = Instant::now();
        let mut tracker = KeyTracker::new(thresholds());
        tracker.handle(&KeyEvent {
            key: PowerKey::Sleep,
            transition: KeyTransition::Pressed,
            at: base,
        });
        // Release arrives as a different power-class code; still one cycle.
        let out = tracker.handle(&KeyEvent {
            key: PowerKey::Wakeup,
            transition: KeyTransition::Released,
            at: base + Duration::from_millis(300),
        });
        assert_eq!(out, Some(PressClass::Short));
    }

    // --- dispatch ---

    #[test]
    fn long_press_runs_wake_then_logout_prompt() {
        let runner = RecordingRunner::new();
        dispatch(PressClass::Long, &FixedOracle(false), &runner);
        assert_eq!(
            runner.attempted(),
            vec![SystemAction::Wake, SystemAction::LogoutPrompt]
        );
    }

    #[test]
    fn long_press_attempts_both_actions_even_when_failing() {
        let runner = RecordingRunner::failing();
        dispatch(PressClass::Long, &FixedOracle(false), &runner);
        assert_eq!(
            runner.attempted(),
            vec![SystemAction::Wake, SystemAction::LogoutPrompt]
        );
    }

    #[test]
    fn short_press_with_screen_off_runs_wake_only() {
        let runner = RecordingRunner::new();
        dispatch(PressClass::Short, &FixedOracle(true), &runner);
        assert_eq!(runner.attempted(), vec![SystemAction::Wake]);
    }

    #[test]
    fn short_press_with_screen_on_runs_screen_off_only() {
        let runner = RecordingRunner::new();
        dispatch(PressClass::Short, &FixedOracle(false), &runner);
        assert_eq!(runner.attempted(), vec![SystemAction::ScreenOff]);
    }

    #[test]
    fn dead_zone_runs_nothing() {
        let runner = RecordingRunner::new();
        dispatch(PressClass::Ignored, &FixedOracle(true), &runner);
        assert!(runner.attempted().is_empty());
    }

    // --- end-to-end cycles through tracker + dispatch ---

    #[test]
    fn short_cycle_with_screen_on_fires_screen_off() {
        let base = Instant::now();
        let mut tracker = KeyTracker::new(thresholds());
        let runner = RecordingRunner::new();

        tracker.handle(&press_at(base, 0));
        let class = tracker.handle(&release_at(base, 400)).unwrap();
        dispatch(class, &FixedOracle(false), &runner);

        assert_eq!(runner.attempted(), vec![SystemAction::ScreenOff]);
    }

    #[test]
    fn long_cycle_fires_wake_and_logout_prompt() {
        let base = Instant::now();
        let mut tracker = KeyTracker::new(thresholds());
        let runner = RecordingRunner::new();

        tracker.handle(&press_at(base, 0));
        let class = tracker.handle(&release_at(base, 2000)).unwrap();
        dispatch(class, &FixedOracle(false), &runner);

        assert_eq!(
            runner.attempted(),
            vec![SystemAction::Wake, SystemAction::LogoutPrompt]
        );
    }

    // --- action names ---

    #[test]
    fn action_names_are_stable() {
        assert_eq!(SystemAction::Wake.name(), "wake");
        assert_eq!(SystemAction::LogoutPrompt.name(), "logout-prompt");
        assert_eq!(SystemAction::ScreenOff.name(), "screen-off");
    }
}
