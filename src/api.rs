use std::future::Future;
use std::sync::{Arc, RwLock};

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::models::user::{UserId, UserPatch};

/// Token and user returned by the login endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginResponse {
    pub token: Option<String>,
    pub user: Option<Value>,
}

impl LoginResponse {
    fn from_value(value: Value) -> Self {
        let token = value
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let user = value.get("user").filter(|u| !u.is_null()).cloned();
        Self { token, user }
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    senha: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateDiaryRequest<'a> {
    pub titulo: &'a str,
    pub texto: &'a str,
}

/// Fetching a single diary entry. The analysis poll only needs this, so it
/// is the seam tests substitute.
pub trait DiaryBackend: Send + Sync + 'static {
    fn fetch_diary(&self, id: &str) -> impl Future<Output = ClientResult<Value>> + Send;
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(config: &Config) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self::with_client(http, &config.api_base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bearer token sent with every subsequent request. Shared by clones.
    pub fn set_auth_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn auth_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.http.request(method, url);
        match self.auth_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> ClientResult<Value> {
        let response = builder.send().await?;
        Self::handle(response, path).await
    }

    async fn handle(response: Response, path: &str) -> ClientResult<Value> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(body);
            tracing::warn!(status = status.as_u16(), path = path, "Backend request failed");
            return Err(ClientError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn get(&self, path: &str) -> ClientResult<Value> {
        self.send(self.request(Method::GET, path), path).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ClientResult<Value> {
        self.send(self.request(method, path).json(body), path).await
    }

    // ------------------------------------------------------------------
    // Auth & profile
    // ------------------------------------------------------------------

    pub async fn login(&self, email: &str, senha: &str) -> ClientResult<LoginResponse> {
        let value = self
            .send_json(Method::POST, "/auth/login", &LoginRequest { email, senha })
            .await?;
        Ok(LoginResponse::from_value(value))
    }

    pub async fn current_user(&self) -> ClientResult<Value> {
        self.get("/auth/me").await
    }

    pub async fn update_profile(&self, user_id: &UserId, patch: &UserPatch) -> ClientResult<Value> {
        self.send_json(Method::PUT, &format!("/usuarios/{user_id}"), patch)
            .await
    }

    // ------------------------------------------------------------------
    // Diary
    // ------------------------------------------------------------------

    pub async fn create_diary(&self, titulo: &str, texto: &str) -> ClientResult<Value> {
        self.send_json(Method::POST, "/diario", &CreateDiaryRequest { titulo, texto })
            .await
    }

    pub async fn list_diaries(&self) -> ClientResult<Value> {
        self.get("/diario").await
    }

    pub async fn get_diary(&self, id: &str) -> ClientResult<Value> {
        self.get(&format!("/diario/{id}")).await
    }

    // ------------------------------------------------------------------
    // Questionnaire & dashboard aggregates
    // ------------------------------------------------------------------

    pub async fn questionnaire_answered(&self, user_id: &UserId) -> ClientResult<Value> {
        self.get(&format!("/questionario/verificar/{user_id}")).await
    }

    pub async fn questionnaire_history(&self, user_id: &UserId) -> ClientResult<Value> {
        self.get(&format!("/questionario/historico/{user_id}")).await
    }

    pub async fn questionnaire_stats(&self, user_id: &UserId) -> ClientResult<Value> {
        self.get(&format!("/questionario/estatisticas/{user_id}")).await
    }

    pub async fn correlations(&self, user_id: &UserId) -> ClientResult<Value> {
        self.get(&format!("/questionario/correlacoes/{user_id}")).await
    }

    pub async fn athena_conversations(&self) -> ClientResult<Value> {
        self.get("/dica/conversas").await
    }
}

impl DiaryBackend for ApiClient {
    async fn fetch_diary(&self, id: &str) -> ClientResult<Value> {
        self.get_diary(id).await
    }
}
