use std::sync::Arc;

use tokio::sync::mpsc::{Receiver, UnboundedReceiver};

use super::round_timer::{RoundTimer, TimerSignal};
use super::sequencer::{
    plan_steps, resolve_round, DamageRules, PresentationStep, Sequencer, StepTimings,
};
use super::GameApi;
use crate::config::BattleSettings;
use crate::error::{ApiError, BattleError, ErrorKind};
use crate::metrics::{
    ANSWERS_SUBMITTED_TOTAL, BATTLES_ACTIVE, BATTLES_TOTAL, ROUNDS_STARTED_TOTAL,
    TIMER_EXPIRATIONS_TOTAL,
};
use crate::models::{
    AnswerOrigin, BattleState, GameOutcome, GameSession, Question, RoundOutcome, TimerEvent,
    Urgency,
};
use crate::presentation::{Destination, ErrorView, Navigator, Presenter};

const EMPTY_ANSWER_NOTICE: &str = "Please enter an answer!";
const UNKNOWN_CHOICE_NOTICE: &str = "Please pick one of the listed answers.";
const NO_MORE_QUESTIONS_NOTICE: &str = "No more questions available! Game completed.";
const SIGNED_OUT_MESSAGE: &str = "Your login has expired. Please sign in again.";

/// Input from the player. Answers carry the round they were given for so
/// input left over from an earlier question is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Typed input. Fill-in questions submit it as-is; choice questions accept
    /// a 1-based choice number or the choice text.
    Answer { round: u64, text: String },
    /// Picks the choice at `index` (0-based).
    Choose { round: u64, index: usize },
    ToggleHint,
    Retry,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Idle,
    AwaitingAnswer,
    Submitting,
    /// Question loop halted on an error until the player retries or leaves.
    Stalled(ErrorKind),
    Finished(GameOutcome),
    SignedOut,
    Left,
}

impl ControllerPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ControllerPhase::Finished(_) | ControllerPhase::SignedOut | ControllerPhase::Left
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Stale round, or nothing awaiting an answer.
    Ignored,
    /// Input refused before reaching the backend.
    Rejected,
    Failed(ErrorKind),
    Resolved(RoundOutcome),
}

enum Input {
    Timer(TimerEvent),
    Action(UserAction),
    Closed,
}

/// Owns one battle: the session, the current question, both health bars and
/// the round timer. It is the only writer of any of them.
pub struct BattleController {
    api: Arc<dyn GameApi>,
    presenter: Arc<dyn Presenter>,
    navigator: Arc<dyn Navigator>,
    settings: BattleSettings,
    rules: DamageRules,
    sequencer: Sequencer,
    timer: RoundTimer,
    timer_events: Option<UnboundedReceiver<TimerEvent>>,
    session: Option<GameSession>,
    question: Option<Question>,
    state: Option<BattleState>,
    round: u64,
    phase: ControllerPhase,
    hint_visible: bool,
}

impl BattleController {
    pub fn new(
        api: Arc<dyn GameApi>,
        presenter: Arc<dyn Presenter>,
        navigator: Arc<dyn Navigator>,
        settings: BattleSettings,
        timings: StepTimings,
    ) -> Self {
        let (timer, timer_events) =
            RoundTimer::new(settings.question_time_limit_secs, settings.tick_interval());
        let rules = DamageRules {
            player_damage: settings.player_damage,
            monster_damage: settings.monster_damage,
        };

        Self {
            api,
            presenter,
            navigator,
            settings,
            rules,
            sequencer: Sequencer::new(timings),
            timer,
            timer_events: Some(timer_events),
            session: None,
            question: None,
            state: None,
            round: 0,
            phase: ControllerPhase::Idle,
            hint_visible: false,
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn battle_state(&self) -> Option<BattleState> {
        self.state
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn timer(&self) -> &RoundTimer {
        &self.timer
    }

    pub fn is_hint_visible(&self) -> bool {
        self.hint_visible
    }

    pub fn outcome(&self) -> Option<GameOutcome> {
        match self.phase {
            ControllerPhase::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Creates the session and loads the first question.
    ///
    /// Backend failures are already shown to the player when this returns
    /// `Err`; a failed start can be retried with [`UserAction::Retry`].
    pub async fn start(&mut self) -> Result<(), BattleError> {
        if self.phase.is_terminal() {
            return Err(BattleError::Finished);
        }
        if self.session.is_some() {
            return Err(BattleError::AlreadyStarted);
        }

        tracing::info!(
            "Starting battle (difficulty {}, class {})",
            self.settings.difficulty,
            self.settings.class_id
        );

        let api = Arc::clone(&self.api);
        let session = match api
            .create_session(&self.settings.difficulty, &self.settings.class_id)
            .await
        {
            Ok(session) => session,
            Err(ApiError::Unauthorized) => {
                self.sign_out();
                return Err(ApiError::Unauthorized.into());
            }
            Err(e) => {
                tracing::error!("Failed to create battle session: {}", e);
                self.presenter.error(&ErrorView::for_session(&e));
                return Err(e.into());
            }
        };

        let state = session.initial_battle_state();
        self.presenter.session_started(&session, &state);
        self.session = Some(session);
        self.state = Some(state);
        BATTLES_ACTIVE.inc();

        self.load_next_question().await
    }

    /// Fetches the next question and starts its countdown. An exhausted
    /// question bank ends the battle as a win.
    pub async fn load_next_question(&mut self) -> Result<(), BattleError> {
        if self.phase.is_terminal() {
            return Err(BattleError::Finished);
        }
        let session = self.session.clone().ok_or(BattleError::NoSession)?;

        self.timer.cancel();
        self.presenter.input_enabled(false);

        let api = Arc::clone(&self.api);
        match api.fetch_next_question(&session).await {
            Ok(question) => {
                self.round += 1;
                self.hint_visible = false;
                ROUNDS_STARTED_TOTAL
                    .with_label_values(&[question.kind.as_str()])
                    .inc();
                tracing::info!(
                    "Round {} loaded ({} question)",
                    self.round,
                    question.kind.as_str()
                );

                self.presenter.question_loaded(&question, self.round);
                self.question = Some(question);
                self.phase = ControllerPhase::AwaitingAnswer;

                self.timer.start();
                let remaining = self.timer.remaining_seconds();
                self.presenter
                    .timer_changed(remaining, Urgency::from_remaining(remaining));
                self.presenter.input_enabled(true);
            }
            Err(ApiError::NoQuestionsAvailable) => {
                tracing::info!("Question bank exhausted, battle won");
                self.presenter.notice(NO_MORE_QUESTIONS_NOTICE);
                let outcome = GameOutcome::Win {
                    reward: session.monster_stats.money_win,
                };
                self.sequencer
                    .play(
                        &[PresentationStep::GameEnd { outcome }],
                        self.presenter.as_ref(),
                    )
                    .await;
                self.finish(outcome);
            }
            Err(ApiError::Unauthorized) => self.sign_out(),
            Err(e) => {
                tracing::error!("Failed to load question: {}", e);
                self.question = None;
                self.phase = ControllerPhase::Stalled(e.kind());
                self.presenter.error(&ErrorView::for_question(&e));
            }
        }

        Ok(())
    }

    /// Submits player input for `round`.
    pub async fn submit_answer(&mut self, round: u64, text: &str) -> SubmitOutcome {
        if !self.accepts_round(round) {
            return SubmitOutcome::Ignored;
        }
        let Some(question) = self.question.as_ref() else {
            return SubmitOutcome::Ignored;
        };

        let answer = if question.kind.collects_text() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                self.presenter.notice(EMPTY_ANSWER_NOTICE);
                return SubmitOutcome::Rejected;
            }
            trimmed.to_string()
        } else {
            match resolve_choice(question, text) {
                Some(choice) => choice,
                None => {
                    self.presenter.notice(UNKNOWN_CHOICE_NOTICE);
                    return SubmitOutcome::Rejected;
                }
            }
        };

        self.submit(answer, AnswerOrigin::User).await
    }

    /// Submits the text of the choice at `index`.
    pub async fn choose(&mut self, round: u64, index: usize) -> SubmitOutcome {
        if !self.accepts_round(round) {
            return SubmitOutcome::Ignored;
        }
        let choice = self
            .question
            .as_ref()
            .filter(|q| q.kind.requires_choices())
            .and_then(|q| q.choice(index))
            .map(str::to_string);

        match choice {
            Some(choice) => self.submit(choice, AnswerOrigin::User).await,
            None => {
                self.presenter.notice(UNKNOWN_CHOICE_NOTICE);
                SubmitOutcome::Rejected
            }
        }
    }

    /// Submits the forfeit token for the current round.
    pub async fn force_forfeit(&mut self) -> SubmitOutcome {
        if self.phase != ControllerPhase::AwaitingAnswer {
            return SubmitOutcome::Ignored;
        }
        let token = self.settings.forfeit_token.clone();
        self.submit(token, AnswerOrigin::Timeout).await
    }

    fn accepts_round(&self, round: u64) -> bool {
        if self.phase != ControllerPhase::AwaitingAnswer || round != self.round {
            tracing::debug!(
                "Ignoring answer for round {} (current round {}, phase {:?})",
                round,
                self.round,
                self.phase
            );
            return false;
        }
        true
    }

    async fn submit(&mut self, answer: String, origin: AnswerOrigin) -> SubmitOutcome {
        let (Some(session), Some(question), Some(previous)) =
            (self.session.clone(), self.question.clone(), self.state)
        else {
            return SubmitOutcome::Ignored;
        };

        self.phase = ControllerPhase::Submitting;
        let remaining = self.timer.remaining_seconds();
        self.timer.cancel();
        self.presenter.input_enabled(false);

        tracing::debug!(
            "Submitting {} answer for round {}: {:?}",
            origin.as_str(),
            self.round,
            answer
        );

        let api = Arc::clone(&self.api);
        let result = match api.submit_answer(&session, &question, &answer).await {
            Ok(result) => result,
            Err(ApiError::Unauthorized) => {
                ANSWERS_SUBMITTED_TOTAL
                    .with_label_values(&["error", origin.as_str()])
                    .inc();
                self.sign_out();
                return SubmitOutcome::Failed(ErrorKind::Auth);
            }
            Err(e) => {
                ANSWERS_SUBMITTED_TOTAL
                    .with_label_values(&["error", origin.as_str()])
                    .inc();
                tracing::warn!("Answer for round {} not accepted: {}", self.round, e);
                self.presenter.error(&ErrorView::for_submit(&e));

                // Same round stays current; a forfeit is not re-armed.
                self.phase = ControllerPhase::AwaitingAnswer;
                if origin == AnswerOrigin::User && remaining > 0 {
                    self.timer.resume(remaining);
                    self.presenter
                        .timer_changed(remaining, Urgency::from_remaining(remaining));
                }
                self.presenter.input_enabled(true);
                return SubmitOutcome::Failed(e.kind());
            }
        };

        let status_label = if result.status.is_correct() {
            "correct"
        } else {
            "incorrect"
        };
        ANSWERS_SUBMITTED_TOTAL
            .with_label_values(&[status_label, origin.as_str()])
            .inc();

        let resolution = resolve_round(&previous, &result, &self.rules);
        let steps = plan_steps(&previous, &resolution, &result, question.kind, origin);
        self.state = Some(resolution.next_state(&previous));

        tracing::info!(
            "Round {} resolved: {} (player {}/{}, monster {}/{}) -> {:?}",
            self.round,
            result.status.tag(),
            resolution.player.current(),
            resolution.player.max(),
            resolution.monster.current(),
            resolution.monster.max(),
            resolution.outcome
        );

        self.sequencer.play(&steps, self.presenter.as_ref()).await;

        match resolution.outcome.terminal() {
            Some(outcome) => self.finish(outcome),
            None => {
                if let Err(e) = self.load_next_question().await {
                    tracing::warn!("Next question not requested: {}", e);
                }
            }
        }

        SubmitOutcome::Resolved(resolution.outcome)
    }

    /// Shows or hides the current question's hint. Returns whether it is now visible.
    pub fn toggle_hint(&mut self) -> bool {
        let Some(hint) = self
            .question
            .as_ref()
            .filter(|q| q.has_hint())
            .and_then(|q| q.hint.as_deref())
        else {
            return false;
        };
        if self.phase != ControllerPhase::AwaitingAnswer {
            return self.hint_visible;
        }

        self.hint_visible = !self.hint_visible;
        self.presenter
            .hint_toggled(self.hint_visible.then_some(hint));
        self.hint_visible
    }

    /// Resumes after a failed start or a halted question loop.
    pub async fn retry(&mut self) -> Result<(), BattleError> {
        match self.phase {
            ControllerPhase::Stalled(kind) => {
                tracing::info!("Retrying question load after {} error", kind.as_str());
                self.load_next_question().await
            }
            ControllerPhase::Idle if self.session.is_none() => self.start().await,
            _ => Ok(()),
        }
    }

    /// Player navigated away. Stops the countdown and drops the session.
    pub fn leave(&mut self) {
        if self.phase.is_terminal() {
            return;
        }
        tracing::info!("Player left the battle");
        self.timer.cancel();
        self.release_session();
        self.phase = ControllerPhase::Left;
    }

    fn sign_out(&mut self) {
        tracing::warn!("Credential rejected, redirecting to login");
        self.timer.cancel();
        self.release_session();
        self.phase = ControllerPhase::SignedOut;
        self.presenter
            .error(&ErrorView::new(ErrorKind::Auth, SIGNED_OUT_MESSAGE));
        self.navigator.navigate(Destination::Login);
    }

    fn finish(&mut self, outcome: GameOutcome) {
        self.timer.cancel();
        self.release_session();
        self.phase = ControllerPhase::Finished(outcome);
        BATTLES_TOTAL.with_label_values(&[outcome.as_str()]).inc();
        tracing::info!(
            "Battle finished: {} (reward {})",
            outcome.as_str(),
            outcome.reward()
        );
        self.navigator.navigate(Destination::Results(outcome));
    }

    fn release_session(&mut self) {
        self.question = None;
        self.hint_visible = false;
        if self.session.take().is_some() {
            BATTLES_ACTIVE.dec();
        }
    }

    /// Applies one countdown event. Expiry forces the forfeit answer.
    pub async fn handle_timer_event(&mut self, event: TimerEvent) -> Option<SubmitOutcome> {
        match self.timer.accept(event)? {
            TimerSignal::Tick {
                remaining_seconds,
                urgency,
            } => {
                self.presenter.timer_changed(remaining_seconds, urgency);
                None
            }
            TimerSignal::Expired => {
                TIMER_EXPIRATIONS_TOTAL.inc();
                self.presenter.timer_changed(0, Urgency::Danger);
                Some(self.force_forfeit().await)
            }
        }
    }

    pub async fn handle_action(&mut self, action: UserAction) {
        match action {
            UserAction::Answer { round, text } => {
                self.submit_answer(round, &text).await;
            }
            UserAction::Choose { round, index } => {
                self.choose(round, index).await;
            }
            UserAction::ToggleHint => {
                self.toggle_hint();
            }
            UserAction::Retry => {
                if let Err(e) = self.retry().await {
                    tracing::debug!("Retry did not resume the battle: {}", e);
                }
            }
            UserAction::Leave => self.leave(),
        }
    }

    /// Drives the battle until it finishes, the player leaves, or the action
    /// channel closes. Returns the outcome when the battle was decided.
    pub async fn run(&mut self, mut actions: Receiver<UserAction>) -> Option<GameOutcome> {
        let Some(mut timer_events) = self.timer_events.take() else {
            return self.outcome();
        };

        while !self.phase.is_terminal() {
            let input = tokio::select! {
                Some(event) = timer_events.recv() => Input::Timer(event),
                action = actions.recv() => match action {
                    Some(action) => Input::Action(action),
                    None => Input::Closed,
                },
            };

            match input {
                Input::Timer(event) => {
                    self.handle_timer_event(event).await;
                }
                Input::Action(action) => self.handle_action(action).await,
                Input::Closed => self.leave(),
            }
        }

        self.timer_events = Some(timer_events);
        self.outcome()
    }

    /// Takes the raw countdown receiver for callers that drive events themselves.
    pub fn take_timer_events(&mut self) -> Option<UnboundedReceiver<TimerEvent>> {
        self.timer_events.take()
    }
}

/// Maps typed input onto a choice. The choice text wins; a 1-based number
/// is only tried when no choice reads like the input.
fn resolve_choice(question: &Question, text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let by_text = question
        .choices
        .iter()
        .find(|choice| choice.trim() == trimmed)
        .or_else(|| {
            question
                .choices
                .iter()
                .find(|choice| choice.trim().eq_ignore_ascii_case(trimmed))
        });
    if let Some(choice) = by_text {
        return Some(choice.clone());
    }
    trimmed
        .parse::<usize>()
        .ok()
        .and_then(|number| number.checked_sub(1))
        .and_then(|index| question.choice(index))
        .map(str::to_string)
}
