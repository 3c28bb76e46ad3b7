use serde::Serialize;

/// Verdict tag returned by the backend. Only `correct` means correct;
/// every other tag is kept verbatim for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnswerStatus {
    Correct,
    Incorrect(String),
}

impl AnswerStatus {
    pub const CORRECT_TAG: &'static str = "correct";

    pub fn from_tag(tag: &str) -> Self {
        if tag == Self::CORRECT_TAG {
            AnswerStatus::Correct
        } else {
            AnswerStatus::Incorrect(tag.to_string())
        }
    }

    pub fn is_correct(&self) -> bool {
        matches!(self, AnswerStatus::Correct)
    }

    pub fn tag(&self) -> &str {
        match self {
            AnswerStatus::Correct => Self::CORRECT_TAG,
            AnswerStatus::Incorrect(tag) => tag,
        }
    }
}

/// Outcome of one submission, already normalized by the network adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerResult {
    pub status: AnswerStatus,
    pub player_hp: Option<i64>,
    pub monster_hp: Option<i64>,
    pub feedback: Option<String>,
}

impl AnswerResult {
    pub fn correct() -> Self {
        Self {
            status: AnswerStatus::Correct,
            player_hp: None,
            monster_hp: None,
            feedback: None,
        }
    }

    pub fn incorrect() -> Self {
        Self {
            status: AnswerStatus::Incorrect("incorrect".to_string()),
            player_hp: None,
            monster_hp: None,
            feedback: None,
        }
    }

    pub fn with_player_hp(mut self, hp: i64) -> Self {
        self.player_hp = Some(hp);
        self
    }

    pub fn with_monster_hp(mut self, hp: i64) -> Self {
        self.monster_hp = Some(hp);
        self
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

/// Who produced the submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOrigin {
    User,
    Timeout,
}

impl AnswerOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOrigin::User => "user",
            AnswerOrigin::Timeout => "timeout",
        }
    }
}
