use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Photo URL keys, in the order they are consulted.
const PHOTO_KEYS: &[&str] = &["foto_perfil_url", "fotoPerfil", "foto_perfil", "fotoPerfilUrl"];

/// Identifier keys, in the order they are consulted.
const ID_KEYS: &[&str] = &["id", "user_id", "usuario_id"];

/// Backend ids arrive as numbers or strings depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(i64),
    Text(String),
}

impl UserId {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(UserId::Number),
            Value::String(s) if !s.is_empty() => Some(UserId::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{n}"),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

/// Canonical user record. One key per field, whatever the backend sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub data_nascimento: Option<String>,
    pub idade: Option<i64>,
    pub telefone: Option<String>,
    pub genero: Option<String>,
    #[serde(rename = "fotoPerfil")]
    pub foto_perfil: Option<String>,
}

/// Partial update applied after a profile edit. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_nascimento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idade: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genero: Option<String>,
    #[serde(rename = "fotoPerfil", skip_serializing_if = "Option::is_none")]
    pub foto_perfil: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, user: &mut UserData) {
        if let Some(v) = &self.nome {
            user.nome = Some(v.clone());
        }
        if let Some(v) = &self.email {
            user.email = Some(v.clone());
        }
        if let Some(v) = &self.data_nascimento {
            user.data_nascimento = Some(v.clone());
        }
        if let Some(v) = self.idade {
            user.idade = Some(v);
        }
        if let Some(v) = &self.telefone {
            user.telefone = Some(v.clone());
        }
        if let Some(v) = &self.genero {
            user.genero = Some(v.clone());
        }
        if let Some(v) = &self.foto_perfil {
            user.foto_perfil = Some(v.clone());
        }
    }

    /// Merge into a stored raw payload. A new photo also drops the alternate
    /// photo keys so the next restore reads the new one.
    pub fn merge_into(&self, payload: &mut Map<String, Value>) {
        if self.foto_perfil.is_some() {
            for key in PHOTO_KEYS {
                payload.remove(*key);
            }
        }
        if let Ok(Value::Object(fields)) = serde_json::to_value(self) {
            payload.extend(fields);
        }
    }
}

/// A user-bearing payload as the backend returned it, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawUserPayload {
    /// A plain user object.
    Record(RawUserRecord),
    /// `{ "user": { .. } }`
    Wrapped(RawUserRecord),
    /// An array; the first plain object is the user.
    Listed(RawUserRecord),
    /// Nothing usable: null, scalars, or an array with no objects.
    Unusable,
}

impl RawUserPayload {
    pub fn classify(value: &Value) -> Self {
        match value {
            Value::Array(items) => items
                .iter()
                .find_map(|item| item.as_object())
                .map(|obj| RawUserPayload::Listed(RawUserRecord(obj.clone())))
                .unwrap_or(RawUserPayload::Unusable),
            Value::Object(obj) => match obj.get("user") {
                Some(Value::Object(inner)) => RawUserPayload::Wrapped(RawUserRecord(inner.clone())),
                _ => RawUserPayload::Record(RawUserRecord(obj.clone())),
            },
            _ => RawUserPayload::Unusable,
        }
    }

    pub fn into_record(self) -> Option<RawUserRecord> {
        match self {
            RawUserPayload::Record(r) | RawUserPayload::Wrapped(r) | RawUserPayload::Listed(r) => {
                Some(r)
            }
            RawUserPayload::Unusable => None,
        }
    }
}

/// The user object itself, with whatever keys the backend chose.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawUserRecord(pub Map<String, Value>);

impl RawUserRecord {
    fn pick_string(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(Value::as_str).map(str::to_string)
    }

    pub fn user_id(&self) -> Option<UserId> {
        ID_KEYS
            .iter()
            .find_map(|key| self.0.get(*key).and_then(UserId::from_value))
    }

    pub fn normalize(&self) -> UserData {
        let idade = self
            .0
            .get("idade")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));

        UserData {
            id: self.user_id(),
            nome: self.pick_string("nome"),
            email: self.pick_string("email"),
            data_nascimento: self.pick_string("data_nascimento"),
            idade,
            telefone: self.pick_string("telefone"),
            genero: self.pick_string("genero"),
            foto_perfil: PHOTO_KEYS
                .iter()
                .find_map(|key| self.pick_string(key).filter(|s| !s.is_empty())),
        }
    }

    /// Raw payload with the canonical fields laid over it, as persisted.
    pub fn storage_payload(&self, normalized: &UserData) -> Map<String, Value> {
        let mut payload = self.0.clone();
        // absent optional identity fields are dropped rather than nulled
        for key in ["id", "nome", "email"] {
            payload.remove(key);
        }
        if let Ok(Value::Object(fields)) = serde_json::to_value(normalized) {
            payload.extend(fields);
        }
        payload
    }
}

/// Normalized user plus the payload to persist for it.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedUser {
    pub user: UserData,
    pub storage_payload: Map<String, Value>,
}

/// Resolve any backend value to a canonical user, or `None` when nothing in
/// it looks like a user record.
pub fn normalize_user_value(value: &Value) -> Option<NormalizedUser> {
    let record = RawUserPayload::classify(value).into_record()?;
    let user = record.normalize();
    let storage_payload = record.storage_payload(&user);
    Some(NormalizedUser {
        user,
        storage_payload,
    })
}

/// Up to two uppercase initials: first letters of the first two words.
pub fn user_initials(name: Option<&str>) -> String {
    let Some(name) = name.filter(|n| !n.trim().is_empty()) else {
        return "?".into();
    };

    name.split_whitespace()
        .take(2)
        .filter_map(|part| part.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalizes_plain_record() {
        let value = json!({
            "id": 7,
            "nome": "Ana Souza",
            "email": "ana@gmail.com",
            "data_nascimento": "1990-01-01",
            "idade": 34,
            "telefone": "11987654321",
            "genero": "feminino",
            "foto_perfil_url": "https://cdn/a.png"
        });

        let parsed = normalize_user_value(&value).unwrap();
        assert_eq!(parsed.user.id, Some(UserId::Number(7)));
        assert_eq!(parsed.user.nome.as_deref(), Some("Ana Souza"));
        assert_eq!(parsed.user.idade, Some(34));
        assert_eq!(parsed.user.foto_perfil.as_deref(), Some("https://cdn/a.png"));
        assert_eq!(parsed.storage_payload["fotoPerfil"], json!("https://cdn/a.png"));
        // raw keys survive in the stored payload
        assert_eq!(parsed.storage_payload["foto_perfil_url"], json!("https://cdn/a.png"));
    }

    #[test]
    fn test_unwraps_user_property() {
        let value = json!({ "token": "t", "user": { "user_id": "abc", "nome": "Bia" } });
        let payload = RawUserPayload::classify(&value);
        assert!(matches!(payload, RawUserPayload::Wrapped(_)));

        let parsed = normalize_user_value(&value).unwrap();
        assert_eq!(parsed.user.id, Some(UserId::Text("abc".into())));
        assert_eq!(parsed.user.nome.as_deref(), Some("Bia"));
        assert!(!parsed.storage_payload.contains_key("token"));
    }

    #[test]
    fn test_array_uses_first_object() {
        let value = json!([1, "x", { "usuario_id": 9, "fotoPerfilUrl": "p.png" }, { "id": 10 }]);
        let parsed = normalize_user_value(&value).unwrap();
        assert_eq!(parsed.user.id, Some(UserId::Number(9)));
        assert_eq!(parsed.user.foto_perfil.as_deref(), Some("p.png"));
    }

    #[test]
    fn test_photo_fallback_order() {
        let value = json!({ "foto_perfil": "third.png", "fotoPerfil": "second.png" });
        let parsed = normalize_user_value(&value).unwrap();
        assert_eq!(parsed.user.foto_perfil.as_deref(), Some("second.png"));

        let non_string = json!({ "foto_perfil_url": 42, "foto_perfil": "third.png" });
        let parsed = normalize_user_value(&non_string).unwrap();
        assert_eq!(parsed.user.foto_perfil.as_deref(), Some("third.png"));

        let empty_first = json!({ "id": 1, "foto_perfil_url": "", "fotoPerfil": "x.png" });
        let parsed = normalize_user_value(&empty_first).unwrap();
        assert_eq!(parsed.user.foto_perfil.as_deref(), Some("x.png"));

        let only_empty = json!({ "id": 1, "foto_perfil_url": "" });
        let parsed = normalize_user_value(&only_empty).unwrap();
        assert_eq!(parsed.user.foto_perfil, None);
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed = normalize_user_value(&json!({ "nome": 123 })).unwrap();
        assert_eq!(parsed.user, UserData::default());
        assert_eq!(parsed.storage_payload.get("nome"), None);
        assert_eq!(parsed.storage_payload["telefone"], Value::Null);
    }

    #[test]
    fn test_unusable_values() {
        assert_eq!(normalize_user_value(&Value::Null), None);
        assert_eq!(normalize_user_value(&json!("user")), None);
        assert_eq!(normalize_user_value(&json!([1, 2, 3])), None);
        assert_eq!(normalize_user_value(&json!([])), None);
    }

    #[test]
    fn test_normalization_is_stable_over_stored_payload() {
        let value = json!({ "user_id": 5, "nome": "Caio", "foto_perfil": "c.png" });
        let first = normalize_user_value(&value).unwrap();
        let again = normalize_user_value(&Value::Object(first.storage_payload.clone())).unwrap();
        assert_eq!(first.user, again.user);
    }

    #[test]
    fn test_patch_merge_replaces_photo_keys() {
        let mut payload = json!({ "id": 1, "foto_perfil_url": "old.png", "fotoPerfil": "old.png" })
            .as_object()
            .cloned()
            .unwrap();
        let patch = UserPatch {
            foto_perfil: Some("new.png".into()),
            nome: Some("Novo".into()),
            ..Default::default()
        };
        patch.merge_into(&mut payload);

        assert!(!payload.contains_key("foto_perfil_url"));
        let user = normalize_user_value(&Value::Object(payload)).unwrap().user;
        assert_eq!(user.foto_perfil.as_deref(), Some("new.png"));
        assert_eq!(user.nome.as_deref(), Some("Novo"));
    }

    #[test]
    fn test_user_initials() {
        assert_eq!(user_initials(None), "?");
        assert_eq!(user_initials(Some("   ")), "?");
        assert_eq!(user_initials(Some("ana")), "A");
        assert_eq!(user_initials(Some("ana maria souza")), "AM");
        assert_eq!(user_initials(Some(" élio  costa ")), "ÉC");
    }
}
