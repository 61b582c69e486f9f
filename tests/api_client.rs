use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use mindtracking::dashboard::DashboardSnapshot;
use mindtracking::diary::{DiaryFeed, PollEvent, PollPolicy};
use mindtracking::forms::DiaryDraft;
use mindtracking::models::diary::EntryId;
use mindtracking::models::user::{UserId, UserPatch};
use mindtracking::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};
use mindtracking::{ApiClient, ClientError, MemoryStore, Session};

const TOKEN: &str = "token-123";

#[derive(Clone, Default)]
struct Backend {
    diary_fetches: Arc<AtomicU32>,
    profile_updates: Arc<AtomicU32>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["email"] == "ana@gmail.com" && body["senha"] == "Abcdef1!" {
        (
            StatusCode::OK,
            Json(json!({ "token": TOKEN, "user": { "id": 7, "nome": "Ana" } })),
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Credenciais inválidas" })),
        )
    }
}

async fn me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "token" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "user": [{
            "usuario_id": 7,
            "nome": "Ana Clara",
            "email": "ana@gmail.com",
            "fotoPerfilUrl": "https://cdn/ana.png",
            "idade": 30
        }] })),
    )
}

async fn update_profile(
    State(backend): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    backend.profile_updates.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "id": id, "updated": body }))
}

async fn create_diary(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "entrada": {
        "id": 10,
        "titulo": body["titulo"],
        "texto": body["texto"],
        "data_hora": "2025-05-01T09:30:00"
    } }))
}

async fn list_diaries() -> Json<Value> {
    Json(json!({ "success": true, "entradas": [
        { "id": 1, "titulo": "Antes", "texto": "a", "data_hora": "2025-04-01T10:00:00" },
        { "_id": "abc", "title": "Depois", "text": "b", "createdAt": "2025-04-02T10:00:00Z",
          "emocao": "alegria" }
    ] }))
}

async fn get_diary(State(backend): State<Backend>, Path(id): Path<i64>) -> Json<Value> {
    let n = backend.diary_fetches.fetch_add(1, Ordering::SeqCst) + 1;
    if n >= 3 {
        Json(json!({ "entrada": {
            "id": id,
            "texto": "Hoje foi bom",
            "emocao_predominante": "alegria",
            "intensidade_emocional": "moderada",
            "comentario_athena": "Continue assim!"
        } }))
    } else {
        Json(json!({ "entrada": { "id": id, "texto": "Hoje foi bom" } }))
    }
}

async fn server_error() -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "falha interna" })),
    )
}

async fn spawn_backend(backend: Backend) -> String {
    let router = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/usuarios/:id", axum::routing::put(update_profile))
        .route("/api/diario", post(create_diary).get(list_diaries))
        .route("/api/diario/:id", get(get_diary))
        .route(
            "/api/questionario/verificar/:id",
            get(|| async { Json(json!({ "data": { "ja_respondido": true } })) }),
        )
        .route(
            "/api/questionario/historico/:id",
            get(|| async { Json(json!([])) }),
        )
        .route(
            "/api/questionario/estatisticas/:id",
            get(|| async { Json(json!({ "estatisticas": { "total_questionarios": "3" } })) }),
        )
        .route("/api/questionario/correlacoes/:id", get(server_error))
        .route(
            "/api/dica/conversas",
            get(|| async { Json(json!({ "success": true, "total": 4 })) }),
        )
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn client(base_url: &str) -> ApiClient {
    ApiClient::with_client(reqwest::Client::new(), base_url)
}

#[tokio::test]
async fn test_login_stores_session_and_loads_user() {
    let base = spawn_backend(Backend::default()).await;
    let mut session = Session::new(client(&base), MemoryStore::new());

    session.login("ana@gmail.com", "Abcdef1!").await.unwrap();

    assert!(!session.is_loading());
    assert_eq!(session.token(), Some(TOKEN));
    assert_eq!(session.store().get(TOKEN_KEY).unwrap().as_deref(), Some(TOKEN));

    let user = session.user().unwrap();
    assert_eq!(user.id, Some(UserId::Number(7)));
    assert_eq!(user.nome.as_deref(), Some("Ana Clara"));
    assert_eq!(user.foto_perfil.as_deref(), Some("https://cdn/ana.png"));
    assert_eq!(user.idade, Some(30));

    let stored: Value =
        serde_json::from_str(&session.store().get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(stored["fotoPerfil"], "https://cdn/ana.png");
    assert_eq!(stored["id"], 7);
}

#[tokio::test]
async fn test_failed_login_leaves_session_empty() {
    let base = spawn_backend(Backend::default()).await;
    let mut session = Session::new(client(&base), MemoryStore::new());

    let err = session.login("ana@gmail.com", "errada").await.unwrap_err();
    match err {
        ClientError::Backend { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Credenciais inválidas");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!session.is_loading());
    assert_eq!(session.token(), None);
    assert!(session.user().is_none());
}

#[tokio::test]
async fn test_restore_with_rejected_token_clears_session() {
    let base = spawn_backend(Backend::default()).await;
    let store = MemoryStore::new();
    store.set(TOKEN_KEY, "expired").unwrap();
    store.set(USER_KEY, r#"{"id": 7, "nome": "Ana"}"#).unwrap();

    let mut session = Session::new(client(&base), store);
    session.restore().await;

    assert!(!session.is_loading());
    assert_eq!(session.token(), None);
    assert!(session.user().is_none());
    assert_eq!(session.store().get(TOKEN_KEY).unwrap(), None);
    assert_eq!(session.store().get(USER_KEY).unwrap(), None);
}

#[tokio::test]
async fn test_restore_refreshes_user() {
    let base = spawn_backend(Backend::default()).await;
    let store = MemoryStore::new();
    store.set(TOKEN_KEY, TOKEN).unwrap();
    store.set(USER_KEY, r#"{"id": 7, "nome": "Ana"}"#).unwrap();

    let mut session = Session::new(client(&base), store);
    session.restore().await;

    assert_eq!(session.token(), Some(TOKEN));
    assert_eq!(session.user().unwrap().nome.as_deref(), Some("Ana Clara"));
}

#[tokio::test]
async fn test_save_profile_updates_backend_and_session() {
    let backend = Backend::default();
    let base = spawn_backend(backend.clone()).await;
    let mut session = Session::new(client(&base), MemoryStore::new());
    session.login("ana@gmail.com", "Abcdef1!").await.unwrap();

    let patch = UserPatch {
        telefone: Some("11987654321".into()),
        ..Default::default()
    };
    session.save_profile(&patch).await.unwrap();

    assert_eq!(backend.profile_updates.load(Ordering::SeqCst), 1);
    assert_eq!(session.user().unwrap().telefone.as_deref(), Some("11987654321"));
}

#[tokio::test]
async fn test_diary_write_waits_for_analysis() {
    let backend = Backend::default();
    let base = spawn_backend(backend.clone()).await;
    let api = client(&base);
    api.set_auth_token(Some(TOKEN.into()));

    let policy = PollPolicy {
        attempts: 6,
        interval: Duration::from_millis(20),
    };
    let mut feed = DiaryFeed::new(api, policy);

    let id = feed
        .create(&DiaryDraft::new("  Hoje  ", "Hoje foi bom"))
        .await
        .unwrap();
    assert_eq!(id, EntryId::Number(10));
    assert_eq!(feed.entries()[0].title, "Hoje");

    assert_eq!(feed.next_event().await, Some(PollEvent::Analyzed(EntryId::Number(10))));
    assert_eq!(backend.diary_fetches.load(Ordering::SeqCst), 3);

    let analysis = feed.entry(&id).unwrap().analysis.clone().unwrap();
    assert_eq!(analysis.emotion, "alegria");
    assert_eq!(analysis.intensity, "moderada");
    assert_eq!(analysis.athena_comment, "Continue assim!");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.diary_fetches.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_invalid_draft_is_not_sent() {
    let base = spawn_backend(Backend::default()).await;
    let mut feed = DiaryFeed::new(client(&base), PollPolicy::default());

    let err = feed.create(&DiaryDraft::new("Hoje", "  ")).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ref m) if m == "Texto é obrigatório"));
    assert!(feed.entries().is_empty());
}

#[tokio::test]
async fn test_diary_list_is_normalized() {
    let base = spawn_backend(Backend::default()).await;
    let mut feed = DiaryFeed::new(client(&base), PollPolicy::default());
    feed.load().await.unwrap();

    let entries = feed.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id, EntryId::Text("abc".into()));
    assert_eq!(entries[0].title, "Depois");
    assert!(entries[0].has_analysis());
    assert_eq!(entries[1].title, "Antes");
    assert_eq!(entries[1].date, "01/04/2025 - 10:00");
    assert_eq!(feed.pending_polls(), 0);
}

#[tokio::test]
async fn test_dashboard_snapshot_from_backend() {
    let base = spawn_backend(Backend::default()).await;
    let api = client(&base);
    let now = chrono::NaiveDate::from_ymd_opt(2025, 4, 2)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();

    let snapshot = DashboardSnapshot::load(&api, Some(&UserId::Number(7)), now).await;

    assert!(snapshot.questionnaire.answered_today);
    assert_eq!(snapshot.questionnaire.answered_total, 3);
    assert_eq!(
        snapshot.diary.ready().unwrap().latest.as_ref().unwrap().title,
        "Depois"
    );
    // correlations endpoint fails, the other cards still load
    assert!(snapshot.correlations.ready().is_none());
    assert_eq!(
        snapshot.athena.ready().map(String::as_str),
        Some("É muito bom conversar com você! Já tivemos 4 conversas juntos.")
    );
}

#[tokio::test]
async fn test_status_mapping() {
    let base = spawn_backend(Backend::default()).await;
    let api = client(&base);

    let err = api.correlations(&UserId::Number(1)).await.unwrap_err();
    assert!(matches!(err, ClientError::Backend { status: 500, ref message } if message == "falha interna"));

    let err = api.get_diary("x/y/z").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));

    let err = api.current_user().await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized));
}
