use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use castify::api::{ApiClient, SIGNAL_CAPACITY};
use castify::cli::{execute, Command, Flow};
use castify::config::normalize_base_url;
use castify::error::{AuthError, LOGIN_FAILED_MESSAGE, SESSION_EXPIRED_MESSAGE};
use castify::identity::session::{AUTH_FLAG_KEY, TOKEN_KEY, USER_KEY};
use castify::identity::{LoginResponse, SessionState};
use castify::resources::Outcome;
use castify::routes::{Navigation, NavigationKind, Route};
use castify::session_store::SessionStore;
use castify::shell::{AppShell, Navigator, View};
use castify::storage::{FileStorage, MemoryStorage, SessionStorage, SharedStorage};

const GOOD_TOKEN: &str = "abc";
const ADMIN_EMAIL: &str = "admin@castify.io";
const ADMIN_PASSWORD: &str = "Secret123!";

#[derive(Default)]
struct MockBackend {
    expired: AtomicBool,
    // Authorization header of every request, in arrival order
    seen_auth: Mutex<Vec<(String, Option<String>)>>,
    logins: Mutex<Vec<Value>>,
}

impl MockBackend {
    fn record(&self, path: &str, headers: &HeaderMap) -> Option<String> {
        let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string);
        self.seen_auth.lock().push((path.to_string(), auth.clone()));
        auth
    }

    fn check(&self, path: &str, headers: &HeaderMap) -> Result<(), Response> {
        let auth = self.record(path, headers);
        if self.expired.load(Ordering::SeqCst) || auth.as_deref() != Some("Bearer abc") {
            return Err((StatusCode::UNAUTHORIZED, Json(json!({"message": "token expired"}))).into_response());
        }
        Ok(())
    }

    fn last_auth(&self) -> Option<String> {
        self.seen_auth.lock().last().and_then(|(_, a)| a.clone())
    }
}

type Shared = Arc<MockBackend>;

async fn login(State(b): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    b.record("auth/login", &headers);
    b.logins.lock().push(body.clone());
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if email == ADMIN_EMAIL && password == ADMIN_PASSWORD && body["portal"] == "admin" {
        let user = json!({"id": "u1", "email": ADMIN_EMAIL, "name": "Ada Admin", "role": "admin"});
        return Json(json!({"token": GOOD_TOKEN, "user": user})).into_response();
    }
    if email == "quiet@castify.io" {
        return (StatusCode::UNAUTHORIZED, Json(json!({}))).into_response();
    }
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid email or password"}))).into_response()
}

async fn me(State(b): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(r) = b.check("me/", &headers) { return r; }
    Json(json!({
        "_id": "u1", "firstName": "Ada", "lastName": "Admin", "email": ADMIN_EMAIL,
        "dob": "1990-01-01", "country": "PK", "gender": "female", "role": "admin"
    }))
    .into_response()
}

async fn candidates(State(b): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(r) = b.check("candidate", &headers) { return r; }
    Json(json!({"data": [
        {"_id": "c1", "name": "Alice", "party": "Blue", "status": "active", "recentElection": "General 2024"},
        {"_id": "c2", "name": "Bob", "party": "Green", "status": "inactive"}
    ]}))
    .into_response()
}

async fn delete_candidate(State(b): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(r) = b.check(&format!("candidate/{}", id), &headers) { return r; }
    StatusCode::NO_CONTENT.into_response()
}

async fn create_candidate(State(b): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(r) = b.check("candidate", &headers) { return r; }
    let mut created = body;
    created["_id"] = json!("c3");
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn update_candidate(State(b): State<Shared>, headers: HeaderMap, Path(id): Path<String>, Json(body): Json<Value>) -> Response {
    if let Err(r) = b.check(&format!("candidate/{}", id), &headers) { return r; }
    let mut updated = body;
    updated["_id"] = json!(id);
    Json(updated).into_response()
}

async fn elections(State(b): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(r) = b.check("election", &headers) { return r; }
    Json(json!([{"_id": "e1", "name": "General 2024", "type": "national", "status": "completed"}])).into_response()
}

async fn results(State(b): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if let Err(r) = b.check(&format!("election/{}/results", id), &headers) { return r; }
    Json(json!({
        "id": id, "name": "General 2024", "status": "completed", "totalVotes": 400,
        "candidates": [
            {"id": "c2", "name": "Bob", "party": "Green", "votes": 100},
            {"id": "c1", "name": "Alice", "party": "Blue", "votes": 300}
        ]
    }))
    .into_response()
}

async fn voters(State(b): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(r) = b.check("voter", &headers) { return r; }
    Json(json!([{"id": "v1", "serialNo": "001", "name": "Zed", "cnic": "1234512345671"}])).into_response()
}

async fn add_voter(State(b): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(r) = b.check("voter", &headers) { return r; }
    let mut created = body;
    created["id"] = json!("v2");
    created["serialNo"] = json!("002");
    (StatusCode::CREATED, Json(created)).into_response()
}

// Start the mock admin API on an ephemeral localhost port. Abort the handle to stop it.
async fn start_mock_api() -> (JoinHandle<()>, Shared, String) {
    let backend: Shared = Arc::new(MockBackend::default());
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/me/", get(me))
        .route("/api/candidate", get(candidates).post(create_candidate))
        .route("/api/candidate/{id}", put(update_candidate).delete(delete_candidate))
        .route("/api/election", get(elections))
        .route("/api/election/{id}/results", get(results))
        .route("/api/voter", get(voters).post(add_voter))
        .with_state(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("mock api error: {e:?}");
        }
    });
    (handle, backend, format!("http://{}/api", addr))
}

struct AbortOnDrop(JoinHandle<()>);
impl Drop for AbortOnDrop { fn drop(&mut self) { self.0.abort(); } }

#[derive(Default)]
struct RecordingNavigator {
    navs: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    fn hard_count(&self) -> usize {
        self.navs.lock().iter().filter(|n| n.kind == NavigationKind::Hard).count()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, nav: &Navigation) { self.navs.lock().push(nav.clone()); }
}

fn build_shell(api_url: &str, storage: SharedStorage, start: &str) -> (AppShell, Arc<RecordingNavigator>) {
    let api = Arc::new(ApiClient::new(normalize_base_url(api_url).unwrap(), storage, None).unwrap());
    let store = Arc::new(SessionStore::new(api));
    let nav = Arc::new(RecordingNavigator::default());
    (AppShell::new(store, nav.clone(), start), nav)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_persists_session_and_attaches_bearer() {
    let (srv, backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let tmp = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(tmp.path().join("session.json")));
    let (shell, _nav) = build_shell(&url, storage.clone(), "/signin");

    assert_eq!(shell.boot(), View::Render(Route::SignIn));
    let view = shell.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.expect("login");
    assert_eq!(view, View::Render(Route::Home));

    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some(GOOD_TOKEN));
    assert_eq!(storage.get(AUTH_FLAG_KEY).unwrap().as_deref(), Some("true"));
    let user: LoginResponse = serde_json::from_str(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(user.token, GOOD_TOKEN);
    assert_eq!(user.user.email, ADMIN_EMAIL);
    assert_eq!(backend.logins.lock()[0]["portal"], "admin");
    assert_eq!(backend.last_auth(), None, "login must not carry a bearer");

    let profile = shell.store().api().me().await.expect("me");
    assert_eq!(profile.full_name(), "Ada Admin");
    assert_eq!(backend.last_auth().as_deref(), Some("Bearer abc"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_failure_keeps_state_and_reports_message() {
    let (srv, _backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let storage = Arc::new(MemoryStorage::new());
    let (shell, nav) = build_shell(&url, storage.clone(), "/signin");
    shell.boot();

    let err = shell.sign_in(ADMIN_EMAIL, "wrong-pass").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials(_)));
    assert_eq!(err.to_string(), "Invalid email or password");

    let err = shell.sign_in("quiet@castify.io", "whatever1").await.unwrap_err();
    assert_eq!(err.to_string(), LOGIN_FAILED_MESSAGE);

    assert!(storage.is_empty());
    assert_eq!(shell.store().state(), SessionState::Unauthenticated);
    assert_eq!(shell.location().path, "/signin");
    assert_eq!(nav.hard_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_401s_clear_storage_and_redirect_once() {
    let (srv, backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let storage = Arc::new(MemoryStorage::new());
    let (shell, nav) = build_shell(&url, storage.clone(), "/signin");
    shell.boot();
    shell.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(shell.navigate("/voters"), View::Render(Route::Voters));

    backend.expired.store(true, Ordering::SeqCst);
    let api = shell.store().api().clone();
    let calls = (0..3).map(|_| {
        let api = api.clone();
        async move { api.me().await }
    });
    let outcomes = futures::future::join_all(calls).await;
    assert!(outcomes.iter().all(|r| matches!(r, Err(e) if e.is_session_invalidated())));
    assert!(storage.is_empty());

    assert_eq!(shell.handle_invalidations(), 1);
    assert_eq!(nav.hard_count(), 1);
    assert_eq!(shell.location().path, "/signin");
    assert_eq!(shell.store().state(), SessionState::Unauthenticated);
    assert_eq!(shell.take_notices(), vec![SESSION_EXPIRED_MESSAGE.to_string()]);

    // nothing left to attach
    backend.expired.store(false, Ordering::SeqCst);
    assert!(api.me().await.is_err());
    assert_eq!(backend.last_auth(), None);
    assert_eq!(shell.handle_invalidations(), 0);
    assert_eq!(nav.hard_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalidation_queued_before_sign_in_does_not_bounce_new_session() {
    let (srv, backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let storage = Arc::new(MemoryStorage::new());
    let (shell, nav) = build_shell(&url, storage.clone(), "/signin");
    shell.boot();
    shell.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();

    // 401 whose signal nobody drains
    backend.expired.store(true, Ordering::SeqCst);
    assert!(shell.store().api().me().await.is_err());
    backend.expired.store(false, Ordering::SeqCst);
    assert!(storage.is_empty());

    shell.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(shell.handle_invalidations(), 0);
    assert_eq!(nav.hard_count(), 0);
    assert!(shell.store().is_authenticated());
    assert_eq!(shell.location().path, "/");
    assert!(shell.take_notices().is_empty());
    assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some(GOOD_TOKEN));
    assert_eq!(shell.navigate("/voters"), View::Render(Route::Voters));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overflowing_signal_buffer_still_redirects_once() {
    let (srv, backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let storage = Arc::new(MemoryStorage::new());
    let (shell, nav) = build_shell(&url, storage.clone(), "/signin");
    shell.boot();
    shell.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(shell.navigate("/candidates"), View::Render(Route::Candidates));

    backend.expired.store(true, Ordering::SeqCst);
    let api = shell.store().api().clone();
    for _ in 0..SIGNAL_CAPACITY + 8 {
        assert!(api.me().await.unwrap_err().is_session_invalidated());
    }

    assert_eq!(shell.handle_invalidations(), 1);
    assert_eq!(nav.hard_count(), 1);
    assert_eq!(shell.location().path, "/signin");
    assert_eq!(shell.store().state(), SessionState::Unauthenticated);
    assert_eq!(shell.take_notices().len(), 1);
    assert!(storage.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn guard_redirect_returns_to_requested_view_after_sign_in() {
    let (srv, _backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let (shell, _nav) = build_shell(&url, Arc::new(MemoryStorage::new()), "/signin");
    shell.boot();

    assert_eq!(shell.navigate("/electionResults/e1?tab=summary"), View::Render(Route::SignIn));
    let pending = shell.pending().unwrap();
    assert_eq!(pending.location.to_string(), "/electionResults/e1?tab=summary");
    assert_eq!(pending.state, Some(json!({"reason": "unauthenticated"})));

    let view = shell.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    assert_eq!(view, View::Render(Route::ElectionResultView { id: "e1".into() }));
    assert_eq!(shell.location().to_string(), "/electionResults/e1?tab=summary");
    assert!(shell.pending().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn partial_persisted_state_forces_sign_in_on_boot() {
    let (srv, _backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let storage = Arc::new(MemoryStorage::with_entries([(TOKEN_KEY, GOOD_TOKEN), (AUTH_FLAG_KEY, "true")]));
    let (shell, nav) = build_shell(&url, storage.clone(), "/voters");

    assert_eq!(shell.boot(), View::Render(Route::SignIn));
    assert_eq!(nav.hard_count(), 1);
    assert!(storage.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn session_survives_restart_with_file_storage() {
    let (srv, backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("session.json");

    let (first, _) = build_shell(&url, Arc::new(FileStorage::new(&path)), "/signin");
    first.boot();
    first.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    drop(first);

    let (second, nav) = build_shell(&url, Arc::new(FileStorage::new(&path)), "/candidates");
    assert_eq!(second.boot(), View::Render(Route::Candidates));
    assert_eq!(nav.hard_count(), 0);
    let list = second.store().api().list_candidates().await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].recent_election, "General 2024");
    assert_eq!(backend.last_auth().as_deref(), Some("Bearer abc"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sign_out_clears_storage_and_reloads_sign_in() {
    let (srv, _backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let storage = Arc::new(MemoryStorage::new());
    let (shell, nav) = build_shell(&url, storage.clone(), "/signin");
    shell.boot();
    shell.sign_in(ADMIN_EMAIL, ADMIN_PASSWORD).await.unwrap();
    shell.navigate("/profile");

    assert_eq!(shell.sign_out(), View::Render(Route::SignIn));
    assert!(storage.is_empty());
    assert_eq!(nav.hard_count(), 1);
    assert_eq!(shell.navigate("/profile"), View::Render(Route::SignIn));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cli_commands_run_through_the_guard() {
    let (srv, _backend, url) = start_mock_api().await;
    let _g = AbortOnDrop(srv);
    let (shell, _nav) = build_shell(&url, Arc::new(MemoryStorage::new()), "/signin");
    shell.boot();

    let err = execute(&shell, Command::Voters).await.unwrap_err();
    assert!(err.to_string().contains("sign in required"));

    let forgot = Command::parse("forgot-password admin@castify.io").unwrap().unwrap();
    assert_eq!(execute(&shell, forgot).await.unwrap(), Flow::Continue);
    assert_eq!(shell.location().path, "/forgot-password");
    let bad_signup = Command::parse("signup Al 123 not-an-email short nope").unwrap().unwrap();
    assert!(execute(&shell, bad_signup).await.unwrap_err().to_string().contains("fullName"));
    assert!(Command::parse("results e1/x").is_err());

    let login = Command::parse(&format!("login {} {}", ADMIN_EMAIL, ADMIN_PASSWORD)).unwrap().unwrap();
    assert_eq!(execute(&shell, login).await.unwrap(), Flow::Continue);
    assert_eq!(execute(&shell, Command::Results("e1".into())).await.unwrap(), Flow::Continue);
    assert_eq!(execute(&shell, Command::Elections).await.unwrap(), Flow::Continue);
    assert_eq!(execute(&shell, Command::DeleteCandidate("c 2".into())).await.unwrap(), Flow::Continue);
    let add = Command::parse("add-candidate Carol Red https://img.example/carol.png").unwrap().unwrap();
    assert_eq!(execute(&shell, add).await.unwrap(), Flow::Continue);
    let status = Command::parse("candidate-status c2 active").unwrap().unwrap();
    assert_eq!(execute(&shell, status).await.unwrap(), Flow::Continue);
    let voter = Command::parse("add-voter Zed zed@castify.io 1234512345671 e1").unwrap().unwrap();
    assert_eq!(execute(&shell, voter).await.unwrap(), Flow::Continue);
    let bad_voter = Command::parse("add-voter Zed zed@castify.io 12345-12345 e1").unwrap().unwrap();
    assert!(execute(&shell, bad_voter).await.unwrap_err().to_string().contains("cnic"));
    let missing = Command::parse("candidate-status nope active").unwrap().unwrap();
    assert!(execute(&shell, missing).await.unwrap_err().to_string().contains("no candidate"));
    assert_eq!(execute(&shell, Command::Quit).await.unwrap(), Flow::Quit);

    let results = shell.store().api().election_results("e1").await.unwrap().summarize();
    match results.outcome {
        Outcome::Winner { winner, runner_up } => {
            assert_eq!(winner.name, "Alice");
            assert_eq!(winner.percentage, 75.0);
            assert_eq!(runner_up.unwrap().name, "Bob");
        }
        other => panic!("expected a winner, got {:?}", other),
    }
}
