#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::{Json, Router};
use serde_json::Value;
use url::Url;

use battle_client::config::BattleSettings;
use battle_client::error::ApiError;
use battle_client::models::{
    AnswerResult, BattleState, BlankParts, GameSession, MonsterStats, OpaqueId, PlayerStats,
    Question, QuestionType, Urgency,
};
use battle_client::presentation::{Destination, ErrorView, Navigator, Presenter};
use battle_client::services::sequencer::{PresentationStep, StepTimings};
use battle_client::services::{BattleController, GameApi};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

// Fixtures

pub fn session(player_hp: u32, monster_hp: u32, money_win: u32) -> GameSession {
    GameSession {
        session_id: OpaqueId::Text("session-1".to_string()),
        class_id: OpaqueId::Text("class1".to_string()),
        difficulty: "easy".to_string(),
        player_stats: PlayerStats {
            hp: player_hp,
            max_hp: player_hp,
            atk: 10,
            level: 1,
        },
        monster_stats: MonsterStats {
            hp: monster_hp,
            max_hp: monster_hp,
            level: 1,
            money_win,
        },
    }
}

pub fn choice_question(id: i64, text: &str, choices: &[&str]) -> Question {
    Question {
        id: Some(OpaqueId::Number(id)),
        kind: QuestionType::SingleChoice,
        text: text.to_string(),
        choices: choices.iter().map(|c| c.to_string()).collect(),
        hint: None,
        blank: None,
    }
}

pub fn fill_question(id: i64, text: &str, hint: Option<&str>) -> Question {
    Question {
        id: Some(OpaqueId::Number(id)),
        kind: QuestionType::FillInBlank,
        text: text.to_string(),
        choices: Vec::new(),
        hint: hint.map(str::to_string),
        blank: Some(BlankParts::from_sentence(text, None)),
    }
}

pub fn settings() -> BattleSettings {
    BattleSettings {
        class_id: OpaqueId::Text("class1".to_string()),
        ..BattleSettings::default()
    }
}

// Scripted backend

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateSession {
        difficulty: String,
        class_id: OpaqueId,
    },
    FetchQuestion {
        session_id: OpaqueId,
    },
    Submit {
        question_id: Option<OpaqueId>,
        answer: String,
    },
}

/// In-memory `GameApi` that replays queued responses.
///
/// An empty session queue yields a 100/50 session, an empty question queue
/// means the bank is exhausted and an empty answer queue answers incorrect.
#[derive(Default)]
pub struct ScriptedApi {
    sessions: Mutex<VecDeque<Result<GameSession, ApiError>>>,
    questions: Mutex<VecDeque<Result<Question, ApiError>>>,
    answers: Mutex<VecDeque<Result<AnswerResult, ApiError>>>,
    calls: Mutex<Vec<ApiCall>>,
    submit_delay: Mutex<Option<Duration>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, session: Result<GameSession, ApiError>) -> Self {
        self.sessions.lock().unwrap().push_back(session);
        self
    }

    pub fn with_question(self, question: Result<Question, ApiError>) -> Self {
        self.questions.lock().unwrap().push_back(question);
        self
    }

    pub fn with_answer(self, answer: Result<AnswerResult, ApiError>) -> Self {
        self.answers.lock().unwrap().push_back(answer);
        self
    }

    pub fn with_submit_delay(self, delay: Duration) -> Self {
        *self.submit_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::FetchQuestion { .. }))
            .count()
    }

    pub fn submitted_answers(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::Submit { answer, .. } => Some(answer),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl GameApi for ScriptedApi {
    async fn create_session(
        &self,
        difficulty: &str,
        class_id: &OpaqueId,
    ) -> Result<GameSession, ApiError> {
        self.calls.lock().unwrap().push(ApiCall::CreateSession {
            difficulty: difficulty.to_string(),
            class_id: class_id.clone(),
        });
        let next = self.sessions.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(session(100, 50, 30)))
    }

    async fn fetch_next_question(&self, session: &GameSession) -> Result<Question, ApiError> {
        self.calls.lock().unwrap().push(ApiCall::FetchQuestion {
            session_id: session.session_id.clone(),
        });
        let next = self.questions.lock().unwrap().pop_front();
        next.unwrap_or(Err(ApiError::NoQuestionsAvailable))
    }

    async fn submit_answer(
        &self,
        _session: &GameSession,
        question: &Question,
        answer: &str,
    ) -> Result<AnswerResult, ApiError> {
        self.calls.lock().unwrap().push(ApiCall::Submit {
            question_id: question.id.clone(),
            answer: answer.to_string(),
        });
        let delay = *self.submit_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.answers.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(AnswerResult::incorrect()))
    }
}

// Recording presenter / navigator

#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    SessionStarted { player: u32, monster: u32 },
    Question { round: u64, text: String },
    Timer { remaining: u32, urgency: Urgency },
    Input(bool),
    Hint(Option<String>),
    Step(PresentationStep),
    Notice(String),
    Error(ErrorView),
}

#[derive(Default)]
pub struct RecordingPresenter {
    shown: Mutex<Vec<Shown>>,
}

impl RecordingPresenter {
    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<PresentationStep> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Step(step) => Some(step),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<ErrorView> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<String> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Notice(n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn timer_updates(&self) -> Vec<(u32, Urgency)> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Timer { remaining, urgency } => Some((remaining, urgency)),
                _ => None,
            })
            .collect()
    }

    pub fn hints(&self) -> Vec<Option<String>> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Hint(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    pub fn input_enabled(&self) -> Option<bool> {
        self.shown().into_iter().rev().find_map(|s| match s {
            Shown::Input(enabled) => Some(enabled),
            _ => None,
        })
    }

    fn push(&self, shown: Shown) {
        self.shown.lock().unwrap().push(shown);
    }
}

impl Presenter for RecordingPresenter {
    fn session_started(&self, _session: &GameSession, state: &BattleState) {
        self.push(Shown::SessionStarted {
            player: state.player.current(),
            monster: state.monster.current(),
        });
    }

    fn question_loaded(&self, question: &Question, round: u64) {
        self.push(Shown::Question {
            round,
            text: question.text.clone(),
        });
    }

    fn timer_changed(&self, remaining_seconds: u32, urgency: Urgency) {
        self.push(Shown::Timer {
            remaining: remaining_seconds,
            urgency,
        });
    }

    fn input_enabled(&self, enabled: bool) {
        self.push(Shown::Input(enabled));
    }

    fn hint_toggled(&self, hint: Option<&str>) {
        self.push(Shown::Hint(hint.map(str::to_string)));
    }

    fn step(&self, step: &PresentationStep) {
        self.push(Shown::Step(step.clone()));
    }

    fn notice(&self, message: &str) {
        self.push(Shown::Notice(message.to_string()));
    }

    fn error(&self, error: &ErrorView) {
        self.push(Shown::Error(error.clone()));
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    destinations: Mutex<Vec<Destination>>,
}

impl RecordingNavigator {
    pub fn destinations(&self) -> Vec<Destination> {
        self.destinations.lock().unwrap().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: Destination) {
        self.destinations.lock().unwrap().push(destination);
    }
}

pub struct Harness {
    pub controller: BattleController,
    pub api: Arc<ScriptedApi>,
    pub presenter: Arc<RecordingPresenter>,
    pub navigator: Arc<RecordingNavigator>,
}

pub fn harness(api: ScriptedApi) -> Harness {
    harness_with(api, settings(), StepTimings::default())
}

pub fn harness_with(api: ScriptedApi, settings: BattleSettings, timings: StepTimings) -> Harness {
    init_tracing();
    let api = Arc::new(api);
    let presenter = Arc::new(RecordingPresenter::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let controller = BattleController::new(
        api.clone(),
        presenter.clone(),
        navigator.clone(),
        settings,
        timings,
    );
    Harness {
        controller,
        api,
        presenter,
        navigator,
    }
}

// Mock HTTP backend

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
    pub trace_id: Option<String>,
    pub body: Value,
}

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: StatusCode,
    pub body: Value,
    pub delay: Option<Duration>,
}

impl MockReply {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            delay: None,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: serde_json::json!({"error": status.as_u16()}),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

pub struct MockBackend {
    pub base_url: Url,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockBackend {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

/// Serves `reply` for every POST on a random local port.
pub async fn spawn_backend<F>(reply: F) -> MockBackend
where
    F: Fn(&str, &Value) -> MockReply + Send + Sync + 'static,
{
    init_tracing();
    let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();
    let reply = Arc::new(reply);

    let recorded = requests.clone();
    let app = Router::new().fallback(move |uri: Uri, headers: HeaderMap, body: Bytes| {
        let recorded = recorded.clone();
        let reply = reply.clone();
        async move {
            let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            let header = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            let path = uri.path().trim_start_matches('/').to_string();
            recorded.lock().unwrap().push(RecordedRequest {
                path: path.clone(),
                authorization: header("authorization"),
                trace_id: header("x-trace-id"),
                body: body.clone(),
            });

            let response = reply(&path, &body);
            if let Some(delay) = response.delay {
                tokio::time::sleep(delay).await;
            }
            (response.status, Json(response.body))
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend {
        base_url: Url::parse(&format!("http://{}/", addr)).unwrap(),
        requests,
    }
}
