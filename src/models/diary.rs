use std::fmt;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_TITLE: &str = "Diário";

/// Entry id. `Local` ids are minted when the backend returned none; such
/// entries cannot be fetched again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(i64),
    Text(String),
    Local(Uuid),
}

impl EntryId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(EntryId::Number),
            Value::String(s) if !s.is_empty() => Some(EntryId::Text(s.clone())),
            _ => None,
        }
    }

    /// Id usable in a `GET /diario/{id}` request.
    pub fn backend_id(&self) -> Option<String> {
        match self {
            EntryId::Number(n) => Some(n.to_string()),
            EntryId::Text(s) => Some(s.clone()),
            EntryId::Local(_) => None,
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Number(n) => write!(f, "{n}"),
            EntryId::Text(s) => f.write_str(s),
            EntryId::Local(u) => write!(f, "local-{u}"),
        }
    }
}

/// Emotional analysis attached by the backend once it has processed the text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub message: String,
    pub emotion: String,
    pub intensity: String,
    pub athena_comment: String,
}

/// Canonical diary card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiaryEntry {
    pub id: EntryId,
    pub title: String,
    /// `DD/MM/YYYY - HH:MM`, empty when the backend sent no usable timestamp.
    pub date: String,
    pub description: String,
    pub analysis: Option<Analysis>,
    #[serde(skip)]
    pub created_at: Option<NaiveDateTime>,
}

/// A diary record exactly as far as the backend filled it in. Each field
/// keeps every alias the backend has been seen to use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDiaryRecord {
    pub id: Option<EntryId>,
    pub legacy_id: Option<EntryId>,
    pub titulo: Option<String>,
    pub title: Option<String>,
    pub texto: Option<String>,
    pub text: Option<String>,
    pub descricao: Option<String>,
    pub mensagem: Option<String>,
    pub data_hora: Option<String>,
    pub created_at: Option<String>,
    pub date: Option<String>,
    pub emocao_predominante: Option<String>,
    pub emocao: Option<String>,
    pub intensidade_emocional: Option<String>,
    pub intensidade: Option<String>,
    pub comentario_athena: Option<String>,
    pub comentario: Option<String>,
    pub athena: Option<String>,
}

fn pick_text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_of(candidates: [&Option<String>; 3]) -> Option<String> {
    candidates.into_iter().find_map(|c| c.clone())
}

impl RawDiaryRecord {
    /// Read a record from a backend value, unwrapping an `entrada` envelope.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = match value {
            Value::Object(obj) => match obj.get("entrada") {
                Some(Value::Object(inner)) => inner,
                _ => obj,
            },
            _ => return None,
        };

        Some(Self {
            id: obj.get("id").and_then(EntryId::from_value),
            legacy_id: obj.get("_id").and_then(EntryId::from_value),
            titulo: pick_text(obj, "titulo"),
            title: pick_text(obj, "title"),
            texto: pick_text(obj, "texto"),
            text: pick_text(obj, "text"),
            descricao: pick_text(obj, "descricao"),
            mensagem: pick_text(obj, "mensagem"),
            data_hora: pick_text(obj, "data_hora"),
            created_at: pick_text(obj, "createdAt"),
            date: pick_text(obj, "date"),
            emocao_predominante: pick_text(obj, "emocao_predominante"),
            emocao: pick_text(obj, "emocao"),
            intensidade_emocional: pick_text(obj, "intensidade_emocional"),
            intensidade: pick_text(obj, "intensidade"),
            comentario_athena: pick_text(obj, "comentario_athena"),
            comentario: pick_text(obj, "comentario"),
            athena: pick_text(obj, "athena"),
        })
    }

    pub fn entry_id(&self) -> Option<EntryId> {
        self.id.clone().or_else(|| self.legacy_id.clone())
    }

    pub fn title(&self) -> Option<String> {
        self.titulo.clone().or_else(|| self.title.clone())
    }

    pub fn body(&self) -> Option<String> {
        self.texto
            .clone()
            .or_else(|| self.text.clone())
            .or_else(|| self.descricao.clone())
            .or_else(|| self.mensagem.clone())
    }

    pub fn timestamp(&self) -> Option<String> {
        first_of([&self.data_hora, &self.created_at, &self.date])
    }

    pub fn emotion(&self) -> Option<String> {
        self.emocao_predominante
            .clone()
            .or_else(|| self.emocao.clone())
            .filter(|s| !s.is_empty())
    }

    pub fn intensity(&self) -> Option<String> {
        self.intensidade_emocional
            .clone()
            .or_else(|| self.intensidade.clone())
            .filter(|s| !s.is_empty())
    }

    pub fn athena_comment(&self) -> Option<String> {
        first_of([&self.comentario_athena, &self.comentario, &self.athena]).filter(|s| !s.is_empty())
    }

    pub fn has_analysis(&self) -> bool {
        self.athena_comment().is_some() || self.emotion().is_some() || self.intensity().is_some()
    }

    fn analysis_for(&self, message: &str) -> Option<Analysis> {
        if !self.has_analysis() {
            return None;
        }
        Some(Analysis {
            message: message.to_string(),
            emotion: self.emotion().unwrap_or_default(),
            intensity: self.intensity().unwrap_or_default(),
            athena_comment: self.athena_comment().unwrap_or_default(),
        })
    }
}

impl DiaryEntry {
    /// The one normalization path from a raw record to a card.
    pub fn normalize(raw: &RawDiaryRecord) -> Self {
        let description = raw.body().unwrap_or_default();
        let created_at = raw.timestamp().as_deref().and_then(parse_timestamp);

        Self {
            id: raw.entry_id().unwrap_or_else(|| EntryId::Local(Uuid::new_v4())),
            title: raw.title().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            date: created_at.as_ref().map(format_card_date).unwrap_or_default(),
            analysis: raw.analysis_for(&description),
            description,
            created_at,
        }
    }

    /// Lay a freshly fetched copy of this entry over the card. Fields the
    /// fresh copy lacks keep their current value.
    pub fn merge_fresh(&mut self, fresh: &RawDiaryRecord) {
        if let Some(body) = fresh.body() {
            self.description = body;
        }
        if let Some(ts) = fresh.timestamp().as_deref().and_then(parse_timestamp) {
            self.date = format_card_date(&ts);
            self.created_at = Some(ts);
        }
        if let Some(analysis) = fresh.analysis_for(&self.description) {
            self.analysis = Some(analysis);
        }
    }

    pub fn has_analysis(&self) -> bool {
        self.analysis.is_some()
    }

    /// True when the entry was written within `window` before `now`.
    pub fn written_within(&self, now: NaiveDateTime, window: Duration) -> bool {
        match self.created_at {
            Some(ts) => {
                let age = now - ts;
                age >= Duration::zero() && age < window
            }
            None => false,
        }
    }
}

/// Parse a backend timestamp into local wall-clock time. Offsets are
/// converted; naive timestamps are taken as already local.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `DD/MM/YYYY - HH:MM`
pub fn format_card_date(ts: &NaiveDateTime) -> String {
    ts.format("%d/%m/%Y - %H:%M").to_string()
}

/// `DD/MM às HHhMM`, used on the dashboard card.
pub fn format_short_date(ts: &NaiveDateTime) -> String {
    ts.format("%d/%m às %Hh%M").to_string()
}

/// Character budget for a card preview at the given viewport width.
pub fn preview_length(viewport_width: u32) -> usize {
    match viewport_width {
        0..=639 => 120,
        640..=767 => 150,
        768..=1023 => 200,
        _ => 300,
    }
}

pub fn truncate_for_viewport(text: &str, viewport_width: u32) -> String {
    let max = preview_length(viewport_width);
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{}...", head.trim())
}

/// Entries from a list response: a bare array, `{ entradas: [..] }` or
/// `{ data: [..] }`. Anything else is an empty list.
pub fn parse_diary_list(value: &Value) -> Vec<RawDiaryRecord> {
    let items = match value {
        Value::Array(items) => Some(items),
        Value::Object(obj) => obj
            .get("entradas")
            .and_then(Value::as_array)
            .or_else(|| obj.get("data").and_then(Value::as_array)),
        _ => None,
    };

    items
        .map(|items| items.iter().filter_map(RawDiaryRecord::from_value).collect())
        .unwrap_or_default()
}

/// The created record from a create response. `success: false` is a rejection.
pub fn parse_created_diary(value: &Value) -> ClientResult<RawDiaryRecord> {
    if let Some(false) = value.get("success").and_then(Value::as_bool) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Erro ao criar entrada");
        return Err(ClientError::Rejected(message.to_string()));
    }

    RawDiaryRecord::from_value(value)
        .ok_or_else(|| ClientError::Rejected("Resposta inesperada ao criar entrada".into()))
}

/// Most recent entry by timestamp. Entries without one sort last.
pub fn latest_entry(entries: &[DiaryEntry]) -> Option<&DiaryEntry> {
    entries.iter().max_by_key(|e| e.created_at)
}
