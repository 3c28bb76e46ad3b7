use serde::{Deserialize, Serialize};
use std::fmt;

pub mod answer;
pub mod outcome;
pub mod question;
pub mod timer;

pub use answer::{AnswerOrigin, AnswerResult, AnswerStatus};
pub use outcome::{GameOutcome, RoundOutcome};
pub use question::{BlankParts, Question, QuestionType};
pub use timer::{RoundTimerState, TimerEvent, Urgency};

/// Identifier issued by the backend. Some endpoints hand out numbers, others strings,
/// so the value is echoed back exactly as it arrived.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpaqueId {
    Number(i64),
    Text(String),
}

impl OpaqueId {
    /// Numeric text becomes a number id, anything else stays text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(value) => OpaqueId::Number(value),
            Err(_) => OpaqueId::Text(trimmed.to_string()),
        }
    }
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpaqueId::Number(value) => write!(f, "{}", value),
            OpaqueId::Text(value) => write!(f, "{}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    pub hp: u32,
    pub max_hp: u32,
    pub atk: u32,
    pub level: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonsterStats {
    pub hp: u32,
    pub max_hp: u32,
    pub level: u32,
    pub money_win: u32,
}

/// One battle, as created by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSession {
    pub session_id: OpaqueId,
    pub class_id: OpaqueId,
    pub difficulty: String,
    pub player_stats: PlayerStats,
    pub monster_stats: MonsterStats,
}

impl GameSession {
    /// Starting health always comes from the server-reported stats.
    pub fn initial_battle_state(&self) -> BattleState {
        BattleState {
            player: Health::new(i64::from(self.player_stats.hp), self.player_stats.max_hp),
            monster: Health::new(i64::from(self.monster_stats.hp), self.monster_stats.max_hp),
            reward: self.monster_stats.money_win,
        }
    }
}

/// Health bar value, always within `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Health {
    current: u32,
    max: u32,
}

impl Health {
    pub fn new(current: i64, max: u32) -> Self {
        let clamped = current.clamp(0, i64::from(max));
        Self {
            current: clamped as u32,
            max,
        }
    }

    pub fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn is_depleted(&self) -> bool {
        self.current == 0
    }

    /// Replaces the value, clamping into range.
    pub fn with_current(self, value: i64) -> Self {
        Self::new(value, self.max)
    }

    pub fn damaged(self, amount: u32) -> Self {
        Self {
            current: self.current.saturating_sub(amount),
            max: self.max,
        }
    }

    /// Health bar width in percent.
    pub fn percent(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        f64::from(self.current) / f64::from(self.max) * 100.0
    }
}

/// Local mirror of both health bars plus the reward for winning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BattleState {
    pub player: Health,
    pub monster: Health,
    pub reward: u32,
}
