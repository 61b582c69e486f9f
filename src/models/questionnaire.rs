use serde::Serialize;
use serde_json::Value;

pub const ATHENA_DEFAULT_MESSAGE: &str =
    "Fale livremente sobre como está se sentindo, Athena está aqui para ouvir e apoiar você.";

/// Questionnaire card state on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuestionnaireStatus {
    pub answered_today: bool,
    pub answered_total: u64,
}

/// `ja_respondido` may sit at the top level or under `data`.
pub fn parse_answered_today(value: &Value) -> bool {
    let flag = |v: &Value| v.get("ja_respondido").and_then(Value::as_bool) == Some(true);
    flag(value) || value.get("data").map(flag).unwrap_or(false)
}

pub fn parse_questionnaire_total(value: &Value) -> u64 {
    value
        .get("estatisticas")
        .and_then(|s| s.get("total_questionarios"))
        .and_then(|t| t.as_u64().or_else(|| t.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0)
}

/// Number of conversations held with Athena; anything unexpected counts as none.
pub fn parse_conversation_count(value: &Value) -> u64 {
    value.get("total").and_then(Value::as_u64).unwrap_or(0)
}

pub fn athena_message(conversations: u64) -> String {
    if conversations > 0 {
        format!(
            "É muito bom conversar com você! Já tivemos {conversations} conversas juntos."
        )
    } else {
        ATHENA_DEFAULT_MESSAGE.to_string()
    }
}
