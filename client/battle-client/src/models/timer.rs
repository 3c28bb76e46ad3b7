use chrono::{DateTime, Utc};
use serde::Serialize;

/// Countdown length of one round, in seconds.
pub const QUESTION_TIME_LIMIT_SECS: u32 = 30;
/// At or below this many seconds the countdown is styled as a warning.
pub const WARNING_THRESHOLD_SECS: u32 = 10;
/// At or below this many seconds the countdown is styled as danger.
pub const DANGER_THRESHOLD_SECS: u32 = 5;

/// Styling cue for the countdown display. Purely advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Warning,
    Danger,
}

impl Urgency {
    pub fn from_remaining(remaining_seconds: u32) -> Self {
        if remaining_seconds <= DANGER_THRESHOLD_SECS {
            Urgency::Danger
        } else if remaining_seconds <= WARNING_THRESHOLD_SECS {
            Urgency::Warning
        } else {
            Urgency::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Warning => "warning",
            Urgency::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RoundTimerState {
    pub remaining_seconds: u32,
    pub is_running: bool,
}

/// Raw events emitted by a countdown task. `generation` identifies the
/// countdown that produced them so stale events can be dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TimerEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerTick {
    pub generation: u64,
    pub remaining_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeExpired {
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
}

impl TimerEvent {
    pub fn tick(generation: u64, remaining_seconds: u32) -> Self {
        TimerEvent::TimerTick(TimerTick {
            generation,
            remaining_seconds,
            timestamp: Utc::now(),
        })
    }

    pub fn expired(generation: u64) -> Self {
        TimerEvent::TimeExpired(TimeExpired {
            generation,
            timestamp: Utc::now(),
        })
    }

    pub fn generation(&self) -> u64 {
        match self {
            TimerEvent::TimerTick(tick) => tick.generation,
            TimerEvent::TimeExpired(expired) => expired.generation,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            TimerEvent::TimerTick(_) => "timer-tick",
            TimerEvent::TimeExpired(_) => "time-expired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_thresholds() {
        assert_eq!(Urgency::from_remaining(30), Urgency::Normal);
        assert_eq!(Urgency::from_remaining(11), Urgency::Normal);
        assert_eq!(Urgency::from_remaining(10), Urgency::Warning);
        assert_eq!(Urgency::from_remaining(6), Urgency::Warning);
        assert_eq!(Urgency::from_remaining(5), Urgency::Danger);
        assert_eq!(Urgency::from_remaining(0), Urgency::Danger);
    }

    #[test]
    fn events_serialize_with_kebab_tags() {
        let json = serde_json::to_value(TimerEvent::expired(3)).unwrap();
        assert_eq!(json["type"], "time-expired");
        assert_eq!(json["generation"], 3);
        assert_eq!(TimerEvent::tick(1, 29).event_name(), "timer-tick");
    }
}
