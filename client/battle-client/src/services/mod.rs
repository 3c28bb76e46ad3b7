use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{AnswerResult, GameSession, OpaqueId, Question};

pub mod battle_controller;
pub mod credentials;
pub mod game_api;
pub mod round_timer;
pub mod sequencer;

pub use battle_controller::{BattleController, ControllerPhase, SubmitOutcome, UserAction};
pub use credentials::CredentialStore;
pub use game_api::HttpGameApi;
pub use round_timer::{RoundTimer, TimerSignal};
pub use sequencer::{DamageRules, PresentationStep, Sequencer, StepTimings};

/// Backend operations the battle needs. Implementations convert every
/// transport, status and shape problem into an [`ApiError`].
#[async_trait]
pub trait GameApi: Send + Sync {
    async fn create_session(
        &self,
        difficulty: &str,
        class_id: &OpaqueId,
    ) -> Result<GameSession, ApiError>;

    /// `Err(ApiError::NoQuestionsAvailable)` when the question bank is exhausted.
    async fn fetch_next_question(&self, session: &GameSession) -> Result<Question, ApiError>;

    async fn submit_answer(
        &self,
        session: &GameSession,
        question: &Question,
        answer: &str,
    ) -> Result<AnswerResult, ApiError>;
}
