use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::models::correlation::{process_correlations, Correlacao};
use crate::models::diary::{format_short_date, latest_entry, parse_diary_list, DiaryEntry};
use crate::models::questionnaire::{
    athena_message, parse_answered_today, parse_conversation_count, parse_questionnaire_total,
    QuestionnaireStatus,
};
use crate::models::user::UserId;

/// Window in which the latest diary entry counts as "already written".
pub const DIARY_RECENT_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiaryCardSection {
    AthenaMessage,
    DiaryInfo,
}

impl DiaryCardSection {
    pub const ALL: [DiaryCardSection; 2] = [DiaryCardSection::AthenaMessage, DiaryCardSection::DiaryInfo];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AthenaCardSection {
    HeaderText,
    Button,
}

impl AthenaCardSection {
    pub const ALL: [AthenaCardSection; 2] = [AthenaCardSection::HeaderText, AthenaCardSection::Button];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum CardState<T> {
    Ready(T),
    Failed(String),
}

impl<T> CardState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            CardState::Ready(v) => Some(v),
            CardState::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiaryCard {
    pub latest: Option<DiaryEntry>,
    /// The latest entry was written less than 24 hours ago.
    pub written_recently: bool,
    /// `DD/MM às HHhMM` of the latest entry.
    pub short_date: Option<String>,
}

/// Backend responses the dashboard is built from.
#[derive(Debug)]
pub struct DashboardResponses {
    pub answered: ClientResult<Value>,
    pub history: ClientResult<Value>,
    pub stats: ClientResult<Value>,
    pub diaries: ClientResult<Value>,
    pub correlations: ClientResult<Value>,
    pub conversations: ClientResult<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub questionnaire: QuestionnaireStatus,
    pub history: Option<Value>,
    pub diary: CardState<DiaryCard>,
    pub correlations: CardState<Vec<Correlacao>>,
    pub athena: CardState<String>,
}

fn rejected(value: &Value, default: &str) -> Option<ClientError> {
    match value.get("success").and_then(Value::as_bool) {
        Some(false) => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(default);
            Some(ClientError::Rejected(message.to_string()))
        }
        _ => None,
    }
}

fn diary_card(value: &Value, now: NaiveDateTime) -> ClientResult<DiaryCard> {
    if let Some(e) = rejected(value, "Erro ao buscar diários") {
        return Err(e);
    }

    let entries: Vec<DiaryEntry> = parse_diary_list(value)
        .iter()
        .map(DiaryEntry::normalize)
        .collect();
    let latest = latest_entry(&entries).cloned();

    Ok(DiaryCard {
        written_recently: latest
            .as_ref()
            .is_some_and(|e| e.written_within(now, Duration::hours(DIARY_RECENT_HOURS))),
        short_date: latest
            .as_ref()
            .and_then(|e| e.created_at.as_ref())
            .map(format_short_date),
        latest,
    })
}

fn card<T>(result: ClientResult<T>, card: &str) -> CardState<T> {
    match result {
        Ok(value) => CardState::Ready(value),
        Err(e) => {
            tracing::warn!(card = card, error = %e, "Dashboard card failed to load");
            CardState::Failed(e.user_message())
        }
    }
}

impl DashboardSnapshot {
    /// Build the snapshot from whatever the backend answered.
    pub fn assemble(responses: DashboardResponses, now: NaiveDateTime) -> Self {
        // any questionnaire failure shows the card as "not answered, none so far"
        let questionnaire = match (&responses.answered, &responses.history, &responses.stats) {
            (Ok(answered), Ok(_), Ok(stats)) => QuestionnaireStatus {
                answered_today: parse_answered_today(answered),
                answered_total: parse_questionnaire_total(stats),
            },
            _ => QuestionnaireStatus::default(),
        };
        let history = responses.history.ok();

        let diary = card(
            responses.diaries.and_then(|v| diary_card(&v, now)),
            "diary",
        );
        let correlations = card(
            responses.correlations.and_then(|v| process_correlations(&v)),
            "correlations",
        );
        let athena = card(
            responses
                .conversations
                .map(|v| athena_message(parse_conversation_count(&v))),
            "athena",
        );

        Self {
            questionnaire,
            history,
            diary,
            correlations,
            athena,
        }
    }

    /// Fetch every card concurrently and assemble the snapshot.
    pub async fn load(api: &ApiClient, user_id: Option<&UserId>, now: NaiveDateTime) -> Self {
        let responses = match user_id {
            Some(id) => {
                let (answered, history, stats, diaries, correlations, conversations) = tokio::join!(
                    api.questionnaire_answered(id),
                    api.questionnaire_history(id),
                    api.questionnaire_stats(id),
                    api.list_diaries(),
                    api.correlations(id),
                    api.athena_conversations(),
                );
                DashboardResponses {
                    answered,
                    history,
                    stats,
                    diaries,
                    correlations,
                    conversations,
                }
            }
            None => {
                tracing::warn!("No user id available, per-user dashboard cards skipped");
                let missing = || Err(ClientError::Validation("Usuário não identificado".into()));
                let (diaries, conversations) =
                    tokio::join!(api.list_diaries(), api.athena_conversations());
                DashboardResponses {
                    answered: missing(),
                    history: missing(),
                    stats: missing(),
                    diaries,
                    correlations: missing(),
                    conversations,
                }
            }
        };

        Self::assemble(responses, now)
    }
}
