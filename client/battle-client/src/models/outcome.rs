use serde::Serialize;

/// Terminal result of a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GameOutcome {
    Win { reward: u32 },
    Lose,
}

impl GameOutcome {
    pub fn is_win(&self) -> bool {
        matches!(self, GameOutcome::Win { .. })
    }

    pub fn reward(&self) -> u32 {
        match self {
            GameOutcome::Win { reward } => *reward,
            GameOutcome::Lose => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameOutcome::Win { .. } => "win",
            GameOutcome::Lose => "lose",
        }
    }

    pub fn message(&self) -> String {
        match self {
            GameOutcome::Win { reward } => format!(
                "You won! The monster has been defeated! You earned {} coins!",
                reward
            ),
            GameOutcome::Lose => "Game Over! You have been defeated!".to_string(),
        }
    }
}

/// Decision after each resolved round. Exactly one holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Win { reward: u32 },
    Lose,
    Continue,
}

impl RoundOutcome {
    pub fn terminal(&self) -> Option<GameOutcome> {
        match self {
            RoundOutcome::Win { reward } => Some(GameOutcome::Win { reward: *reward }),
            RoundOutcome::Lose => Some(GameOutcome::Lose),
            RoundOutcome::Continue => None,
        }
    }
}
