//! Seams between the battle controller and whatever renders it.

use serde::Serialize;

use crate::error::{ApiError, ErrorKind};
use crate::models::{BattleState, GameOutcome, GameSession, Question, Urgency};
use crate::services::sequencer::PresentationStep;

pub mod terminal;

pub use terminal::{parse_command, TerminalNavigator, TerminalPresenter};

/// Receives everything the player should see. Calls arrive in order from the
/// controller task; implementations must not block.
pub trait Presenter: Send + Sync {
    fn session_started(&self, session: &GameSession, state: &BattleState);

    /// `round` starts at 1 and identifies the question in later user actions.
    fn question_loaded(&self, question: &Question, round: u64);

    fn timer_changed(&self, remaining_seconds: u32, urgency: Urgency);

    fn input_enabled(&self, enabled: bool);

    /// `Some(hint)` when the hint is now visible, `None` when hidden.
    fn hint_toggled(&self, hint: Option<&str>);

    fn step(&self, step: &PresentationStep);

    fn notice(&self, message: &str);

    fn error(&self, error: &ErrorView);
}

/// User-facing error affordance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorView {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ErrorView {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable: matches!(kind, ErrorKind::Network | ErrorKind::MalformedResponse),
        }
    }

    pub fn for_session(error: &ApiError) -> Self {
        let message = match error.kind() {
            ErrorKind::Auth => "Your login has expired. Please sign in again.",
            ErrorKind::MalformedResponse => "Unexpected response while starting the battle.",
            _ => "Failed to start the battle. Please try again.",
        };
        Self::new(error.kind(), message)
    }

    pub fn for_question(error: &ApiError) -> Self {
        let message = match error.kind() {
            ErrorKind::Auth => "Your login has expired. Please sign in again.",
            ErrorKind::MalformedResponse => "Invalid question format received.",
            _ => "Failed to load question. Please try again.",
        };
        Self::new(error.kind(), message)
    }

    pub fn for_submit(error: &ApiError) -> Self {
        let message = match error.kind() {
            ErrorKind::Auth => "Your login has expired. Please sign in again.",
            ErrorKind::MalformedResponse => "Unexpected response to your answer. Please try again.",
            _ => "Failed to submit answer. Please try again.",
        };
        Self::new(error.kind(), message)
    }
}

/// Where the player goes once the battle view is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Destination {
    Results(GameOutcome),
    Login,
}

impl Destination {
    pub fn path(&self) -> String {
        match self {
            Destination::Results(GameOutcome::Win { reward }) => {
                format!("/game-results?result=win&reward={}", reward)
            }
            Destination::Results(GameOutcome::Lose) => "/game-results?result=lose".to_string(),
            Destination::Login => "/login".to_string(),
        }
    }
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, destination: Destination);
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    /// Presenter that keeps only the sequencer steps.
    #[derive(Default)]
    pub struct StepLog {
        steps: Mutex<Vec<PresentationStep>>,
    }

    impl StepLog {
        pub fn steps(&self) -> Vec<PresentationStep> {
            self.steps.lock().unwrap().clone()
        }
    }

    impl Presenter for StepLog {
        fn session_started(&self, _: &GameSession, _: &BattleState) {}
        fn question_loaded(&self, _: &Question, _: u64) {}
        fn timer_changed(&self, _: u32, _: Urgency) {}
        fn input_enabled(&self, _: bool) {}
        fn hint_toggled(&self, _: Option<&str>) {}
        fn step(&self, step: &PresentationStep) {
            self.steps.lock().unwrap().push(step.clone());
        }
        fn notice(&self, _: &str) {}
        fn error(&self, _: &ErrorView) {}
    }
}
