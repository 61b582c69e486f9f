use serde::Serialize;
use serde_json::Value;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Icon {
    ThumbsUp,
    ThumbsDown,
}

impl Icon {
    /// Scores 1 and 2 are negative answers; everything else, including an
    /// unknown score, shows thumbs-up.
    pub fn for_score(score: Option<i64>) -> Self {
        match score {
            Some(1) | Some(2) => Icon::ThumbsDown,
            _ => Icon::ThumbsUp,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Icon::ThumbsUp => "thumbs-up",
            Icon::ThumbsDown => "thumbs-down",
        }
    }

    pub fn asset_path(&self) -> &'static str {
        match self {
            Icon::ThumbsUp => "/images/icons/thumbs-up-green.svg",
            Icon::ThumbsDown => "/images/icons/thumbs-down-red.svg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlacao {
    pub total_ocorrencias: i64,
    /// Ordinal answer score, 1 (worst) to 4 (best), when the backend sent one.
    pub pontuacao: Option<i64>,
    pub texto_alternativa: String,
    pub texto_pergunta: String,
    pub icone: Icon,
}

/// Integer prefix of a number or string, the way a lenient form parser
/// reads "12 vezes" as 12.
fn leading_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            let end = s
                .char_indices()
                .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
                .map(|(i, _)| i)
                .unwrap_or(s.len());
            s[..end].parse().ok()
        }
        _ => None,
    }
}

fn score(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}

impl Correlacao {
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let pontuacao = obj
            .get("pontuacao")
            .filter(|v| !v.is_null())
            .or_else(|| obj.get("classificacao"))
            .and_then(score);

        Some(Self {
            total_ocorrencias: obj.get("total_ocorrencias").and_then(leading_int).unwrap_or(0),
            pontuacao,
            texto_alternativa: text(obj.get("texto_alternativa")),
            texto_pergunta: text(obj.get("texto_pergunta")),
            icone: Icon::for_score(pontuacao),
        })
    }
}

/// Correlations from the aggregate endpoint, most frequent first.
pub fn process_correlations(value: &Value) -> ClientResult<Vec<Correlacao>> {
    if let Some(false) = value.get("success").and_then(Value::as_bool) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Erro ao carregar correlações");
        return Err(ClientError::Rejected(message.to_string()));
    }

    let mut items: Vec<Correlacao> = value
        .get("correlacoes")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Correlacao::from_value).collect())
        .unwrap_or_default();

    items.sort_by(|a, b| b.total_ocorrencias.cmp(&a.total_ocorrencias));
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_icon_mapping() {
        assert_eq!(Icon::for_score(Some(1)), Icon::ThumbsDown);
        assert_eq!(Icon::for_score(Some(2)), Icon::ThumbsDown);
        assert_eq!(Icon::for_score(Some(3)), Icon::ThumbsUp);
        assert_eq!(Icon::for_score(Some(4)), Icon::ThumbsUp);
        assert_eq!(Icon::for_score(None), Icon::ThumbsUp);
        assert_eq!(Icon::ThumbsDown.name(), "thumbs-down");
    }

    #[test]
    fn test_sorted_by_occurrences_descending() {
        let value = json!({
            "success": true,
            "correlacoes": [
                { "total_ocorrencias": "3", "pontuacao": 1, "texto_alternativa": "Mal", "texto_pergunta": "Como dormiu?" },
                { "total_ocorrencias": 10, "pontuacao": "4", "texto_alternativa": "Ótimo" },
                { "total_ocorrencias": "7 vezes", "classificacao": 2, "texto_alternativa": "Pouco" }
            ]
        });

        let items = process_correlations(&value).unwrap();
        let totals: Vec<i64> = items.iter().map(|c| c.total_ocorrencias).collect();
        assert_eq!(totals, vec![10, 7, 3]);

        assert_eq!(items[0].pontuacao, Some(4));
        assert_eq!(items[0].icone, Icon::ThumbsUp);
        assert_eq!(items[0].texto_pergunta, "");
        assert_eq!(items[1].pontuacao, Some(2));
        assert_eq!(items[1].icone, Icon::ThumbsDown);
        assert_eq!(items[2].texto_pergunta, "Como dormiu?");
    }

    #[test]
    fn test_unparseable_score_defaults_to_thumbs_up() {
        let c = Correlacao::from_value(&json!({ "total_ocorrencias": "x", "pontuacao": "alto" }))
            .unwrap();
        assert_eq!(c.pontuacao, None);
        assert_eq!(c.total_ocorrencias, 0);
        assert_eq!(c.icone, Icon::ThumbsUp);
    }

    #[test]
    fn test_rejected_response() {
        let err = process_correlations(&json!({ "success": false })).unwrap_err();
        assert!(matches!(err, ClientError::Rejected(ref m) if m == "Erro ao carregar correlações"));
        assert!(process_correlations(&json!({})).unwrap().is_empty());
    }
}
