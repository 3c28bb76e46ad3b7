//! HTTP adapter for the game backend.
//!
//! This is the only place that looks at raw response shapes. Everything it
//! returns is already normalized into the canonical model types.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use super::credentials::CredentialStore;
use super::GameApi;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::metrics::track_api_call;
use crate::models::{
    AnswerResult, AnswerStatus, BlankParts, GameSession, MonsterStats, OpaqueId, PlayerStats,
    Question, QuestionType,
};
use crate::utils::retry::{retry_async_if, RetryConfig};

pub const CREATE_SESSION_ENDPOINT: &str = "game/newroom";
pub const GET_QUESTION_ENDPOINT: &str = "game/get_question";
pub const CHECK_ANSWER_ENDPOINT: &str = "game/check_answer";

pub const TRACE_ID_HEADER: &str = "x-trace-id";

const WIN_STATUS: &str = "win";
const LOSE_STATUS: &str = "lose";

// Request bodies

#[derive(Debug, Serialize)]
struct NewRoomRequest<'a> {
    difficulty: &'a str,
    class_id: &'a OpaqueId,
}

#[derive(Debug, Serialize)]
struct GetQuestionRequest<'a> {
    session_id: &'a OpaqueId,
    class_id: &'a OpaqueId,
}

#[derive(Debug, Serialize)]
struct CheckAnswerRequest<'a> {
    session_id: &'a OpaqueId,
    #[serde(skip_serializing_if = "Option::is_none")]
    question_id: Option<&'a OpaqueId>,
    answer: &'a str,
}

// Response bodies

#[derive(Debug, Deserialize)]
struct NewRoomResponse {
    session_id: OpaqueId,
    #[serde(default)]
    difficulty: Option<String>,
    #[serde(alias = "players_stats")]
    player_stats: WireStats,
    monster_stats: WireStats,
}

#[derive(Debug, Default, Deserialize)]
struct WireStats {
    hp: Option<i64>,
    max_hp: Option<i64>,
    atk: Option<i64>,
    level: Option<i64>,
    money_win: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionPayload {
    Many(Vec<WireQuestion>),
    One(Box<WireQuestion>),
}

#[derive(Debug, Default, Deserialize)]
struct WireQuestion {
    id: Option<OpaqueId>,
    #[serde(rename = "type")]
    kind: Option<String>,
    question: Option<WireQuestionBody>,
    choices: Option<Vec<String>>,
    hint: Option<String>,
    instruction: Option<String>,
    sentence_before: Option<String>,
    sentence_after: Option<String>,
}

/// `question` is usually the prompt text, but some backends nest the whole
/// fill-in-blank layout under it.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireQuestionBody {
    Text(String),
    Nested(NestedQuestion),
}

#[derive(Debug, Default, Deserialize)]
struct NestedQuestion {
    #[serde(alias = "question")]
    text: Option<String>,
    choices: Option<Vec<String>>,
    hint: Option<String>,
    instruction: Option<String>,
    sentence_before: Option<String>,
    sentence_after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckAnswerResponse {
    status: Option<String>,
    player_hp: Option<i64>,
    monster_hp: Option<i64>,
    feedback: Option<String>,
    #[serde(alias = "players_stats")]
    player_stats: Option<WireStats>,
    monster_stats: Option<WireStats>,
}

pub struct HttpGameApi {
    client: Client,
    base_url: Url,
    credentials: Arc<CredentialStore>,
    retry: RetryConfig,
}

impl HttpGameApi {
    pub fn new(
        config: &ApiConfig,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            credentials,
            retry: RetryConfig::default(),
        })
    }

    /// Retry policy for question fetches. Session creation and submissions
    /// are never retried.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn post_json<B, R>(&self, endpoint: &'static str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let value = track_api_call(endpoint, self.send(endpoint, body)).await?;
        serde_json::from_value(value).map_err(|e| {
            tracing::warn!("Unexpected {} payload: {}", endpoint, e);
            ApiError::malformed(endpoint, e.to_string())
        })
    }

    async fn send<B>(&self, endpoint: &'static str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + Sync,
    {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| ApiError::Transport {
                endpoint,
                reason: e.to_string(),
            })?;
        let trace_id = Uuid::new_v4().to_string();

        tracing::debug!("POST {} (trace {})", url, trace_id);

        let mut request = self
            .client
            .post(url)
            .header(TRACE_ID_HEADER, &trace_id)
            .json(body);
        if let Some(token) = self.credentials.bearer() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("{} request failed (trace {}): {}", endpoint, trace_id, e);
            ApiError::Transport {
                endpoint,
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("{} rejected the credential, clearing it", endpoint);
            self.credentials.clear();
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            tracing::warn!("{} returned HTTP {} (trace {})", endpoint, status, trace_id);
            return Err(ApiError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                ApiError::malformed(endpoint, e.to_string())
            } else {
                ApiError::Transport {
                    endpoint,
                    reason: e.to_string(),
                }
            }
        })
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn create_session(
        &self,
        difficulty: &str,
        class_id: &OpaqueId,
    ) -> Result<GameSession, ApiError> {
        let body = NewRoomRequest {
            difficulty,
            class_id,
        };
        // Each call opens a new room; never retried.
        let raw: NewRoomResponse = self.post_json(CREATE_SESSION_ENDPOINT, &body).await?;

        let session = normalize_session(raw, difficulty, class_id)?;
        tracing::info!(
            "Battle session {} created (difficulty {}, player hp {}, monster hp {})",
            session.session_id,
            session.difficulty,
            session.player_stats.hp,
            session.monster_stats.hp
        );
        Ok(session)
    }

    async fn fetch_next_question(&self, session: &GameSession) -> Result<Question, ApiError> {
        let body = GetQuestionRequest {
            session_id: &session.session_id,
            class_id: &session.class_id,
        };
        let api = self;
        let body = &body;
        let raw: QuestionPayload = retry_async_if(
            self.retry.clone(),
            ApiError::is_transient,
            move || api.post_json(GET_QUESTION_ENDPOINT, body),
        )
        .await?;

        let question = normalize_question(raw)?;
        tracing::debug!(
            "Question {:?} loaded ({}, {} choices)",
            question.id,
            question.kind.as_str(),
            question.choices.len()
        );
        Ok(question)
    }

    async fn submit_answer(
        &self,
        session: &GameSession,
        question: &Question,
        answer: &str,
    ) -> Result<AnswerResult, ApiError> {
        let body = CheckAnswerRequest {
            session_id: &session.session_id,
            question_id: question.id.as_ref(),
            answer,
        };
        let raw: CheckAnswerResponse = self.post_json(CHECK_ANSWER_ENDPOINT, &body).await?;
        normalize_answer(raw)
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn normalize_session(
    raw: NewRoomResponse,
    difficulty: &str,
    class_id: &OpaqueId,
) -> Result<GameSession, ApiError> {
    let player_hp = raw
        .player_stats
        .hp
        .ok_or_else(|| ApiError::malformed(CREATE_SESSION_ENDPOINT, "player_stats.hp missing"))?;
    let monster_hp = raw
        .monster_stats
        .hp
        .ok_or_else(|| ApiError::malformed(CREATE_SESSION_ENDPOINT, "monster_stats.hp missing"))?;

    let player_hp = to_u32(player_hp);
    let monster_hp = to_u32(monster_hp);

    Ok(GameSession {
        session_id: raw.session_id,
        class_id: class_id.clone(),
        difficulty: raw
            .difficulty
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| difficulty.to_string()),
        player_stats: PlayerStats {
            hp: player_hp,
            max_hp: raw.player_stats.max_hp.map(to_u32).unwrap_or(0).max(player_hp),
            atk: raw.player_stats.atk.map(to_u32).unwrap_or(0),
            level: raw.player_stats.level.map(to_u32).unwrap_or(1),
        },
        monster_stats: MonsterStats {
            hp: monster_hp,
            max_hp: raw.monster_stats.max_hp.map(to_u32).unwrap_or(0).max(monster_hp),
            level: raw.monster_stats.level.map(to_u32).unwrap_or(1),
            money_win: raw.monster_stats.money_win.map(to_u32).unwrap_or(0),
        },
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn normalize_question(payload: QuestionPayload) -> Result<Question, ApiError> {
    let wire = match payload {
        QuestionPayload::Many(list) => list
            .into_iter()
            .next()
            .ok_or(ApiError::NoQuestionsAvailable)?,
        QuestionPayload::One(single) => *single,
    };

    let kind = QuestionType::from_tag(wire.kind.as_deref());
    let (text, nested) = match wire.question {
        Some(WireQuestionBody::Text(text)) => (Some(text), NestedQuestion::default()),
        Some(WireQuestionBody::Nested(mut nested)) => (nested.text.take(), nested),
        None => (None, NestedQuestion::default()),
    };
    let text = non_blank(text)
        .ok_or_else(|| ApiError::malformed(GET_QUESTION_ENDPOINT, "question text missing"))?;

    let mut choices = wire.choices.or(nested.choices).unwrap_or_default();
    if choices.is_empty() && kind == QuestionType::TrueFalse {
        choices = vec!["True".to_string(), "False".to_string()];
    }
    if choices.is_empty() && kind.requires_choices() {
        return Err(ApiError::malformed(
            GET_QUESTION_ENDPOINT,
            format!("{} question without choices", kind.as_str()),
        ));
    }

    let blank = if kind == QuestionType::FillInBlank {
        let instruction = non_blank(wire.instruction.or(nested.instruction));
        let before = wire.sentence_before.or(nested.sentence_before);
        let after = wire.sentence_after.or(nested.sentence_after);
        Some(if before.is_some() || after.is_some() {
            BlankParts {
                instruction: instruction
                    .unwrap_or_else(|| BlankParts::DEFAULT_INSTRUCTION.to_string()),
                sentence_before: before.unwrap_or_default(),
                sentence_after: after.unwrap_or_default(),
            }
        } else {
            BlankParts::from_sentence(&text, instruction)
        })
    } else {
        None
    };

    Ok(Question {
        id: wire.id,
        kind,
        text,
        choices,
        hint: non_blank(wire.hint.or(nested.hint)),
        blank,
    })
}

fn normalize_answer(raw: CheckAnswerResponse) -> Result<AnswerResult, ApiError> {
    let tag = raw
        .status
        .ok_or_else(|| ApiError::malformed(CHECK_ANSWER_ENDPOINT, "status missing"))?;

    let mut player_hp = raw
        .player_hp
        .or_else(|| raw.player_stats.as_ref().and_then(|s| s.hp));
    let mut monster_hp = raw
        .monster_hp
        .or_else(|| raw.monster_stats.as_ref().and_then(|s| s.hp));

    let status = match tag.as_str() {
        WIN_STATUS => {
            monster_hp = monster_hp.or(Some(0));
            AnswerStatus::Correct
        }
        LOSE_STATUS => {
            player_hp = player_hp.or(Some(0));
            AnswerStatus::Incorrect(tag)
        }
        _ => AnswerStatus::from_tag(&tag),
    };

    Ok(AnswerResult {
        status,
        player_hp,
        monster_hp,
        feedback: non_blank(raw.feedback),
    })
}
