//! HTTP control surface.
//!
//! A small CORS-open JSON API driving the OTP engine, plus an embedded
//! status page at `/`. All endpoints are `GET` so they can be exercised
//! from a browser address bar.

use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use otpgate_otp::{IssueKind, OtpEngine, OtpError};

use crate::connection::Link;
use crate::error::RuntimeResult;

/// Shared state behind every endpoint.
pub struct AppState {
    /// The OTP lifecycle engine.
    pub engine: Arc<OtpEngine>,
    /// Read-only view of the messaging link.
    pub link: Link,
}

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/sendotp", get(send_otp))
        .route("/api/resendotp", get(resend_otp))
        .route("/api/verifyotp", get(verify_otp))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds the listener and serves until the task is cancelled.
pub async fn serve(state: Arc<AppState>, host: String, port: u16) -> RuntimeResult<()> {
    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!(%host, port, "HTTP surface listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
struct SendQuery {
    number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    number: Option<String>,
    code: Option<String>,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let link = state.link.status();
    let uptime_secs = link
        .since
        .and_then(|t| SystemTime::now().duration_since(t).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "bot": {
                "connected": link.connected,
                "uptime": uptime_secs,
                "phoneNumber": link.identity,
            },
            "stats": state.engine.stats(),
        })),
    )
}

async fn send_otp(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SendQuery>,
) -> (StatusCode, Json<Value>) {
    issue(&state, query.number.as_deref(), IssueKind::Initial).await
}

async fn resend_otp(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SendQuery>,
) -> (StatusCode, Json<Value>) {
    issue(&state, query.number.as_deref(), IssueKind::Resend).await
}

async fn issue(
    state: &AppState,
    number: Option<&str>,
    kind: IssueKind,
) -> (StatusCode, Json<Value>) {
    let Some(number) = number.filter(|n| !n.is_empty()) else {
        return refusal(StatusCode::BAD_REQUEST, "Phone number is required");
    };

    let Some(handle) = state.link.handle() else {
        return refusal(
            StatusCode::SERVICE_UNAVAILABLE,
            "Messaging transport is not connected",
        );
    };

    match state.engine.issue(number, kind, handle.as_ref()).await {
        Ok(receipt) => {
            let mut body = json!({
                "success": true,
                "message": match kind {
                    IssueKind::Initial => "OTP sent successfully",
                    IssueKind::Resend => "OTP resent successfully",
                },
                "phoneNumber": receipt.phone_number,
            });
            if kind == IssueKind::Initial {
                body["expiresIn"] = json!(receipt.expires_in.as_secs());
            }
            (StatusCode::OK, Json(body))
        }
        Err(OtpError::RateLimited { phone_number }) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "message": "Too many requests. Please try again later.",
                "phoneNumber": phone_number,
            })),
        ),
        Err(OtpError::InvalidNumber(_)) => {
            refusal(StatusCode::BAD_REQUEST, "Phone number is required")
        }
        Err(e) => {
            error!(error = %e, "OTP issuance failed");
            refusal(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send OTP")
        }
    }
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyQuery>,
) -> (StatusCode, Json<Value>) {
    let (Some(number), Some(code)) = (
        query.number.filter(|n| !n.is_empty()),
        query.code.filter(|c| !c.is_empty()),
    ) else {
        return refusal(StatusCode::BAD_REQUEST, "Phone number and code are required");
    };

    match state.engine.verify(&number, &code) {
        Ok(receipt) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": "OTP verified successfully",
                "phoneNumber": receipt.phone_number,
            })),
        ),
        Err(e) => refusal(StatusCode::BAD_REQUEST, verify_refusal_message(&e)),
    }
}

fn verify_refusal_message(error: &OtpError) -> &'static str {
    match error {
        OtpError::NotFound => "No OTP found or already verified",
        OtpError::Expired => "OTP has expired",
        OtpError::TooManyAttempts => "Too many attempts. Request a new OTP",
        OtpError::Mismatch => "Invalid OTP code",
        _ => "Failed to verify OTP",
    }
}

fn refusal(code: StatusCode, message: &str) -> (StatusCode, Json<Value>) {
    (code, Json(json!({ "success": false, "message": message })))
}

// =============================================================================
// Status page
// =============================================================================

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>OTP Gateway</title>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body { font-family: 'Segoe UI', sans-serif; background: #667eea; margin: 0;
               min-height: 100vh; display: flex; justify-content: center; align-items: center; }
        .container { background: white; border-radius: 16px; max-width: 560px;
                     width: 100%; margin: 20px; overflow: hidden; }
        .header { background: #128C7E; color: white; padding: 24px; text-align: center; }
        .content { padding: 24px; }
        .stats { display: grid; grid-template-columns: repeat(2, 1fr); gap: 12px; }
        .stat-card { background: #f8f9fa; padding: 16px; border-radius: 8px; text-align: center; }
        .stat-value { font-size: 28px; font-weight: bold; color: #667eea; }
        .stat-label { font-size: 13px; color: #6c757d; }
        .endpoint { background: #f8f9fa; padding: 12px; border-radius: 6px;
                    margin-top: 10px; font-family: monospace; font-size: 13px; }
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>📱 OTP Gateway</h1>
            <div id="status">Checking…</div>
        </div>
        <div class="content">
            <div class="stats">
                <div class="stat-card"><div class="stat-value" id="total">-</div><div class="stat-label">Total OTPs</div></div>
                <div class="stat-card"><div class="stat-value" id="verified">-</div><div class="stat-label">Verified</div></div>
                <div class="stat-card"><div class="stat-value" id="pending">-</div><div class="stat-label">Pending</div></div>
                <div class="stat-card"><div class="stat-value" id="uptime">-</div><div class="stat-label">Uptime (min)</div></div>
            </div>
            <div class="endpoint">GET /api/sendotp?number=YOUR_PHONE_NUMBER</div>
            <div class="endpoint">GET /api/verifyotp?number=YOUR_PHONE_NUMBER&amp;code=123456</div>
            <div class="endpoint">GET /api/status</div>
        </div>
    </div>
    <script>
        async function refresh() {
            try {
                const data = await (await fetch('/api/status')).json();
                document.getElementById('status').textContent = data.bot.connected ? '🟢 Online' : '🔴 Offline';
                document.getElementById('total').textContent = data.stats.total;
                document.getElementById('verified').textContent = data.stats.verified;
                document.getElementById('pending').textContent = data.stats.pending;
                document.getElementById('uptime').textContent = Math.floor(data.bot.uptime / 60);
            } catch (e) {
                document.getElementById('status').textContent = '⚠️ Error';
            }
        }
        refresh();
        setInterval(refresh, 10000);
    </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use otpgate_core::{
        DeliveryAck, GroupMetadata, MessageKey, OutboundPayload, SendOptions, TransportHandle,
        TransportResult,
    };
    use otpgate_otp::{MemoryOtpStore, OtpPolicy, OtpStore};

    use crate::connection::LinkStatus;

    struct StubHandle {
        sends: Mutex<Vec<(String, OutboundPayload)>>,
    }

    #[async_trait]
    impl TransportHandle for StubHandle {
        fn identity(&self) -> String {
            "263719000000@s.whatsapp.net".to_string()
        }

        async fn send(
            &self,
            conversation_id: &str,
            payload: OutboundPayload,
            _options: SendOptions,
        ) -> TransportResult<DeliveryAck> {
            self.sends
                .lock()
                .push((conversation_id.to_string(), payload));
            Ok(DeliveryAck {
                message_id: "SENT".into(),
            })
        }

        async fn relay(
            &self,
            _conversation_id: &str,
            _raw: serde_json::Value,
        ) -> TransportResult<()> {
            Ok(())
        }

        async fn read_messages(&self, _keys: &[MessageKey]) -> TransportResult<()> {
            Ok(())
        }

        async fn group_metadata(&self, _conversation_id: &str) -> TransportResult<GroupMetadata> {
            Ok(GroupMetadata::default())
        }

        async fn disconnect(&self) {}
    }

    fn connected_state() -> (Arc<AppState>, Arc<MemoryOtpStore>) {
        let store = Arc::new(MemoryOtpStore::new());
        let engine = Arc::new(OtpEngine::new(
            Arc::clone(&store) as Arc<dyn OtpStore>,
            OtpPolicy::default(),
        ));
        let handle = Arc::new(StubHandle {
            sends: Mutex::new(Vec::new()),
        });
        let link = Link::fixed(
            LinkStatus {
                connected: true,
                since: Some(SystemTime::now()),
                identity: Some("263719000000".into()),
            },
            Some(handle),
        );
        (Arc::new(AppState { engine, link }), store)
    }

    fn disconnected_state() -> Arc<AppState> {
        let engine = Arc::new(OtpEngine::new(
            Arc::new(MemoryOtpStore::new()) as Arc<dyn OtpStore>,
            OtpPolicy::default(),
        ));
        Arc::new(AppState {
            engine,
            link: Link::fixed(LinkStatus::default(), None),
        })
    }

    #[tokio::test]
    async fn test_status_reports_connection_and_stats() {
        let (state, _) = connected_state();
        let (code, Json(body)) = status(State(state)).await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["bot"]["connected"], json!(true));
        assert_eq!(body["bot"]["phoneNumber"], json!("263719000000"));
        assert_eq!(body["stats"]["total"], json!(0));
    }

    #[tokio::test]
    async fn test_sendotp_requires_number() {
        let (state, _) = connected_state();
        let (code, Json(body)) =
            send_otp(State(state), Query(SendQuery { number: None })).await;

        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Phone number is required"));
    }

    #[tokio::test]
    async fn test_sendotp_requires_connection() {
        let state = disconnected_state();
        let (code, _) = send_otp(
            State(state),
            Query(SendQuery {
                number: Some("719647303".into()),
            }),
        )
        .await;

        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_sendotp_happy_path() {
        let (state, store) = connected_state();
        let (code, Json(body)) = send_otp(
            State(Arc::clone(&state)),
            Query(SendQuery {
                number: Some("719647303".into()),
            }),
        )
        .await;

        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["phoneNumber"], json!("263719647303"));
        assert_eq!(body["expiresIn"], json!(600));
        assert!(store.find("263719647303").is_some());
    }

    #[tokio::test]
    async fn test_sendotp_rate_limited_after_window_exhausted() {
        let (state, _) = connected_state();
        for _ in 0..5 {
            let (code, _) = send_otp(
                State(Arc::clone(&state)),
                Query(SendQuery {
                    number: Some("719647303".into()),
                }),
            )
            .await;
            assert_eq!(code, StatusCode::OK);
        }

        let (code, Json(body)) = send_otp(
            State(Arc::clone(&state)),
            Query(SendQuery {
                number: Some("719647303".into()),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["phoneNumber"], json!("263719647303"));

        // The resend path is exempt by default policy.
        let (code, Json(body)) = resend_otp(
            State(state),
            Query(SendQuery {
                number: Some("719647303".into()),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["message"], json!("OTP resent successfully"));
        assert!(body.get("expiresIn").is_none());
    }

    #[tokio::test]
    async fn test_verifyotp_requires_both_params() {
        let (state, _) = connected_state();
        let (code, Json(body)) = verify_otp(
            State(state),
            Query(VerifyQuery {
                number: Some("719647303".into()),
                code: None,
            }),
        )
        .await;

        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Phone number and code are required"));
    }

    #[tokio::test]
    async fn test_verifyotp_full_cycle() {
        let (state, store) = connected_state();
        send_otp(
            State(Arc::clone(&state)),
            Query(SendQuery {
                number: Some("719647303".into()),
            }),
        )
        .await;
        let issued = store.find("263719647303").unwrap().code;

        let (code, Json(body)) = verify_otp(
            State(Arc::clone(&state)),
            Query(VerifyQuery {
                number: Some("719647303".into()),
                code: Some("000000".into()),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("Invalid OTP code"));

        let (code, Json(body)) = verify_otp(
            State(state),
            Query(VerifyQuery {
                number: Some("719647303".into()),
                code: Some(issued),
            }),
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["message"], json!("OTP verified successfully"));
    }
}
