//! argocd-session-server: HTTP front end for the session manager
//!
//! Lightweight HTTP server using hyper. Exposes login for the local
//! superuser and a userinfo endpoint that accepts both locally issued and
//! provider issued bearer tokens.

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use argocd_session_core::config::{Config, TransportConfig};
use argocd_session_core::error::{ErrorResponse, SessionError};
use argocd_session_core::SessionManager;

mod platform;

use platform::{MokaCache, ProcessEnv, ReqwestHttpClient, SystemClock};

/// Shared application state
struct AppState {
    sessions: SessionManager,
    session_expiry_secs: i64,
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserInfo {
    logged_in: bool,
    username: String,
    iss: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "argocd-session-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()
        .map_err(|_| SessionError::configuration("PORT must be a number"))?;

    let config = Config::from_env(&ProcessEnv)?;
    let http = ReqwestHttpClient::new(&TransportConfig::default())?;

    if let Some(issuer) = &config.session.oidc_issuer {
        tracing::info!(
            issuer = %issuer,
            gateway = config.session.dex_server_addr.as_deref().unwrap_or("none"),
            "external identity provider configured"
        );
    }

    let sessions = SessionManager::new(
        config.session,
        Arc::new(http),
        Arc::new(MokaCache::new()),
        Arc::new(SystemClock),
    )?;

    let state = Arc::new(AppState {
        sessions,
        session_expiry_secs: config.session_expiry_secs,
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port, issuer = state.sessions.issuer(), "argocd-session-server listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        let state = state.clone();

        tokio::spawn(async move {
            let io = hyper_util::rt::TokioIo::new(stream);
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(req, &state).await }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(error = %e, %peer, "connection error");
            }
        });
    }
}

type HyperResponse = Response<Full<Bytes>>;

async fn handle_request(
    req: Request<Incoming>,
    state: &AppState,
) -> Result<HyperResponse, std::convert::Infallible> {
    Ok(route_request(req, state).await)
}

async fn route_request(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (method, path.as_str()) {
        (Method::GET, "/") => handle_health(),
        (Method::POST, "/api/v1/session") => handle_login(req, state).await,
        (Method::GET, "/api/v1/session/userinfo") => handle_userinfo(req, state).await,
        _ => json_response(StatusCode::NOT_FOUND, &serde_json::json!({"error": "not_found"})),
    }
}

fn handle_health() -> HyperResponse {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "name": "argocd-session",
            "status": "ok"
        }),
    )
}

async fn handle_login(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let body = match req.collect().await {
        Ok(b) => b.to_bytes(),
        Err(_) => return error_response(&SessionError::invalid_request("failed to read body")),
    };

    let login: LoginRequest = match serde_json::from_slice(&body) {
        Ok(l) => l,
        Err(_) => {
            return error_response(&SessionError::invalid_request(
                "body must be JSON with username and password",
            ))
        }
    };

    match state
        .sessions
        .login(&login.username, &login.password, state.session_expiry_secs)
    {
        Ok(token) => json_response(StatusCode::OK, &LoginResponse { token }),
        Err(e) => error_response(&e),
    }
}

async fn handle_userinfo(req: Request<Incoming>, state: &AppState) -> HyperResponse {
    let bearer_token = match extract_bearer_token(req.headers()) {
        Ok(t) => t,
        Err(e) => return error_response(&e),
    };

    match state.sessions.verify_token(&bearer_token).await {
        Ok(claims) => json_response(
            StatusCode::OK,
            &UserInfo {
                logged_in: true,
                username: state.sessions.display_name(&claims).to_string(),
                iss: claims.iss.clone(),
            },
        ),
        Err(e) => error_response(&e),
    }
}

fn extract_bearer_token(headers: &hyper::HeaderMap) -> Result<String, SessionError> {
    let header = headers
        .get("Authorization")
        .ok_or_else(|| SessionError::invalid_request("missing Authorization header"))?
        .to_str()
        .map_err(|_| SessionError::invalid_request("invalid Authorization header encoding"))?;

    match header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(SessionError::invalid_request(
            "Authorization header must use Bearer scheme",
        )),
    }
}

fn error_response(err: &SessionError) -> HyperResponse {
    if err.status_code() >= 500 {
        tracing::error!(error = %err, "request failed");
    }
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &ErrorResponse::from(err))
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HyperResponse {
    let json = serde_json::to_vec(body).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
