//! HTTP trigger endpoints
//!
//! Every operation the service performs is kicked off by an external
//! scheduler hitting one of these GET routes, so a TCP accept loop with
//! one thread per connection is all the plumbing required.

use anyhow::{Context, Result};
use checklist::{BotConfig, ChecklistTracker, DailyOutcome, ProgressOutcome};
use log::{error, info, warn};
use relay::{AuthorizedUser, ExchangeCredentials, StateStore, SyncEngine, SyncError, SyncMode};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// Shared service state handed to every connection thread.
pub struct AppState {
    pub engine: Option<SyncEngine>,
    pub store: Arc<dyn StateStore>,
    pub tracker: Option<ChecklistTracker>,
    /// Mailbox the engine relays, for health reporting
    pub relaying_for: Option<String>,
}

struct HttpResponse {
    status: &'static str,
    content_type: &'static str,
    body: String,
}

impl HttpResponse {
    fn json(status: &'static str, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }

    fn text(status: &'static str, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
        }
    }
}

/// Accept loop. Blocks for the life of the process.
pub fn serve(state: Arc<AppState>, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on 0.0.0.0:{}", port);

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let state = state.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &state) {
                        warn!("Connection handling failed: {}", e);
                    }
                });
            }
            Err(e) => warn!("Failed to accept connection: {}", e),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, state: &AppState) -> Result<()> {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader
        .read_line(&mut request_line)
        .context("Failed to read request line")?;

    // Format: GET /tasks/sync HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");

    let response = route(method, path, state);
    let raw = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.content_type,
        response.body.len(),
        response.body
    );
    stream
        .write_all(raw.as_bytes())
        .context("Failed to write response")?;
    Ok(())
}

fn route(method: &str, path: &str, state: &AppState) -> HttpResponse {
    if method != "GET" {
        return HttpResponse::json(
            "405 Method Not Allowed",
            json!({"error": "only GET is supported"}),
        );
    }

    let path = path.split('?').next().unwrap_or(path);
    match path {
        "/" => HttpResponse::text("200 OK", "relayd is running\n"),
        "/health" => health(state),
        "/tasks/sync" => run_sync(state, SyncMode::Fast),
        "/tasks/sync_deep" => run_sync(state, SyncMode::Deep),
        "/tasks/daily_checklist" => run_daily_checklist(state),
        "/tasks/check_progress" => run_check_progress(state),
        _ => HttpResponse::json("404 Not Found", json!({"error": "not found"})),
    }
}

fn run_sync(state: &AppState, mode: SyncMode) -> HttpResponse {
    let outcome = match state.engine.as_ref() {
        Some(engine) => engine.run_sync_once(mode),
        None => Err(SyncError::Config("relay engine not configured".to_string())),
    };

    match outcome {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(body) => HttpResponse::json("200 OK", body),
            Err(e) => {
                error!("Failed to serialize sync result: {}", e);
                HttpResponse::json(
                    "500 Internal Server Error",
                    json!({"error": "failed to serialize sync result"}),
                )
            }
        },
        Err(e @ SyncError::Config(_)) => {
            warn!("{} sync rejected: {}", mode, e);
            HttpResponse::json("503 Service Unavailable", json!({"error": e.to_string()}))
        }
        Err(e) => {
            error!("{} sync pass failed: {}", mode, e);
            HttpResponse::json("500 Internal Server Error", json!({"error": e.to_string()}))
        }
    }
}

fn run_daily_checklist(state: &AppState) -> HttpResponse {
    let Some(tracker) = state.tracker.as_ref() else {
        return HttpResponse::json(
            "503 Service Unavailable",
            json!({"error": "checklist bot not configured"}),
        );
    };

    match tracker.send_daily() {
        Ok(DailyOutcome::Posted) => HttpResponse::json("200 OK", json!({"status": "posted"})),
        Ok(DailyOutcome::AlreadyPostedToday) => {
            HttpResponse::json("200 OK", json!({"status": "already-posted"}))
        }
        Err(e) => {
            error!("Daily checklist failed: {:#}", e);
            HttpResponse::json(
                "500 Internal Server Error",
                json!({"error": format!("{:#}", e)}),
            )
        }
    }
}

fn run_check_progress(state: &AppState) -> HttpResponse {
    let Some(tracker) = state.tracker.as_ref() else {
        return HttpResponse::json(
            "503 Service Unavailable",
            json!({"error": "checklist bot not configured"}),
        );
    };

    match tracker.check_progress() {
        Ok(ProgressOutcome::Reminded { remaining }) => HttpResponse::json(
            "200 OK",
            json!({"status": "reminded", "remaining": remaining}),
        ),
        Ok(ProgressOutcome::AllDone) => HttpResponse::json("200 OK", json!({"status": "all-done"})),
        Ok(ProgressOutcome::NoChecklist) => {
            HttpResponse::json("200 OK", json!({"status": "no-checklist"}))
        }
        Err(e) => {
            error!("Progress check failed: {:#}", e);
            HttpResponse::json(
                "500 Internal Server Error",
                json!({"error": format!("{:#}", e)}),
            )
        }
    }
}

fn health(state: &AppState) -> HttpResponse {
    let body = json!({
        "status": "ok",
        "exchangeCredentials": ExchangeCredentials::is_available(),
        "gmailToken": AuthorizedUser::is_available(),
        "checklistBot": BotConfig::is_available(),
        "engineReady": state.engine.is_some(),
        "relayingFor": state.relaying_for,
        "checkpoints": {
            "fast": checkpoint_value(state, SyncMode::Fast),
            "deep": checkpoint_value(state, SyncMode::Deep),
        },
    });
    HttpResponse::json("200 OK", body)
}

fn checkpoint_value(state: &AppState, mode: SyncMode) -> serde_json::Value {
    match state.store.get_checkpoint(mode) {
        Ok(checkpoint) => json!(checkpoint),
        Err(e) => {
            warn!("Could not read {} checkpoint: {}", mode, e);
            serde_json::Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay::{
        DestinationId, ImportError, Importer, InMemoryStateStore, SourceError, SourceItem,
        SourceReader, SyncSettings, SyncWindow,
    };

    struct EmptySource;

    impl SourceReader for EmptySource {
        fn fetch(&self, _window: &SyncWindow) -> Result<Vec<SourceItem>, SourceError> {
            Ok(Vec::new())
        }
    }

    struct RejectingImporter;

    impl Importer for RejectingImporter {
        fn write(&self, _item: &SourceItem) -> Result<DestinationId, ImportError> {
            Err(ImportError::Transient("no destination in tests".to_string()))
        }
    }

    fn make_test_state() -> AppState {
        AppState {
            engine: None,
            store: Arc::new(InMemoryStateStore::new()),
            tracker: None,
            relaying_for: None,
        }
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        let response = route("GET", "/nope", &make_test_state());
        assert_eq!(response.status, "404 Not Found");
    }

    #[test]
    fn test_non_get_is_rejected() {
        let response = route("POST", "/tasks/sync", &make_test_state());
        assert_eq!(response.status, "405 Method Not Allowed");
    }

    #[test]
    fn test_query_strings_are_ignored_in_routing() {
        let response = route("GET", "/health?ping=1", &make_test_state());
        assert_eq!(response.status, "200 OK");
    }

    #[test]
    fn test_sync_without_engine_is_a_config_error() {
        let response = route("GET", "/tasks/sync", &make_test_state());
        assert_eq!(response.status, "503 Service Unavailable");

        // The taxonomy's configuration variant carries the explanation
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        let message = body["error"].as_str().unwrap();
        assert!(message.contains("missing or invalid configuration"));
        assert!(message.contains("relay engine not configured"));
    }

    #[test]
    fn test_checklist_without_bot_is_unavailable() {
        let response = route("GET", "/tasks/daily_checklist", &make_test_state());
        assert_eq!(response.status, "503 Service Unavailable");
    }

    #[test]
    fn test_health_reports_engine_state() {
        let response = route("GET", "/health", &make_test_state());
        assert_eq!(response.status, "200 OK");
        assert_eq!(response.content_type, "application/json");

        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["engineReady"], false);
        assert!(body["checkpoints"]["fast"].is_null());
        assert!(body["checkpoints"]["deep"].is_null());
    }

    #[test]
    fn test_sync_route_runs_engine_pass() {
        let mut state = make_test_state();
        state.engine = Some(SyncEngine::new(
            Arc::new(EmptySource),
            Arc::new(RejectingImporter),
            Arc::new(InMemoryStateStore::new()),
            SyncSettings::default(),
        ));

        let response = route("GET", "/tasks/sync", &state);
        assert_eq!(response.status, "200 OK");

        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["mode"], "fast");
        assert_eq!(body["itemsSeen"], 0);
        assert_eq!(body["itemsImported"], 0);
        assert_eq!(body["truncated"], false);
    }
}
