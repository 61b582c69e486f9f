use crate::storage::StorageError;

/// Generic message shown to the user whenever a backend call fails.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Não foi possível concluir a operação. Por favor, tente novamente.";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Backend error {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Rejected by backend: {0}")]
    Rejected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// Message safe to render in the UI. Transport and storage details are
    /// logged here and never surfaced.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Unauthorized => "Sessão expirada. Faça login novamente.".into(),
            ClientError::NotFound(_) => "Registro não encontrado.".into(),
            ClientError::Validation(msg) => msg.clone(),
            ClientError::Rejected(msg) if !msg.is_empty() => msg.clone(),
            ClientError::Http(e) => {
                tracing::error!(error = %e, "HTTP error");
                GENERIC_FAILURE_MESSAGE.into()
            }
            ClientError::Storage(e) => {
                tracing::error!(error = %e, "Storage error");
                GENERIC_FAILURE_MESSAGE.into()
            }
            ClientError::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                GENERIC_FAILURE_MESSAGE.into()
            }
            _ => GENERIC_FAILURE_MESSAGE.into(),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
