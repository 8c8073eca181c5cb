//! Web form producer boundary for the message relay.
//!
//! Serves a minimal anonymous submission form and validates input
//! before anything reaches the relay: blank and oversized texts are
//! rejected here with a 4xx, so the relay only ever carries
//! well-formed messages.

use crate::relay::{MessageRelay, MAX_RELAY_TEXT};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

const FORM_PAGE: &str = r#"<!doctype html>
<html lang="sl">
<head><meta charset="utf-8"><title>Oglasna deska</title></head>
<body>
<h1>Oglasna deska</h1>
<p>Sporočilo bo anonimno objavljeno v klepetu.</p>
<form method="post" action="/oglasna">
<textarea name="text" rows="6" cols="60" maxlength="1900"></textarea><br>
<button type="submit">Pošlji</button>
</form>
</body>
</html>
"#;

/// One submitted form.
#[derive(Debug, Deserialize)]
pub struct Submission {
    pub text: String,
}

/// Builds the web router around a relay producer handle.
#[must_use]
pub fn router(relay: MessageRelay) -> Router {
    Router::new()
        .route("/", get(form_page))
        .route("/oglasna", post(submit))
        .route("/healthz", get(healthz))
        .with_state(relay)
}

/// Binds the listener and serves the form until the process exits.
///
/// # Errors
///
/// Returns an error if the bind address is unavailable or the server
/// fails while running.
pub async fn serve(bind: &str, relay: MessageRelay) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = bind, "web form listening");
    axum::serve(listener, router(relay)).await?;
    Ok(())
}

async fn form_page() -> Html<&'static str> {
    Html(FORM_PAGE)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn submit(
    State(relay): State<MessageRelay>,
    Form(submission): Form<Submission>,
) -> (StatusCode, &'static str) {
    let text = submission.text.trim();
    if text.is_empty() {
        return (StatusCode::BAD_REQUEST, "prazno sporočilo");
    }
    if text.chars().count() > MAX_RELAY_TEXT {
        return (StatusCode::BAD_REQUEST, "sporočilo je predolgo");
    }
    match relay.enqueue(text.to_string()) {
        Ok(()) => {
            info!(len = text.len(), "web submission queued");
            (StatusCode::OK, "sporočilo sprejeto")
        }
        Err(err) => {
            warn!(error = %err, "relay unavailable, rejecting submission");
            (StatusCode::SERVICE_UNAVAILABLE, "oddaja trenutno ni mogoča")
        }
    }
}
