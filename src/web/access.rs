use crate::domain::access::{AccessDecision, DenyReason};
use crate::state::SharedState;
use crate::web::session;
use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct AccessCheckRequest {
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscapeKind {
    Dashboard,
    Back,
    Logout,
}

#[derive(Debug, Clone, Serialize)]
pub struct EscapeAction {
    pub kind: EscapeKind,
    pub label: &'static str,
    /// `None` means client-side history navigation.
    pub href: Option<&'static str>,
    pub method: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialScreen {
    pub title: &'static str,
    pub message: &'static str,
    pub actions: Vec<EscapeAction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessCheckResponse {
    #[serde(flatten)]
    pub decision: AccessDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial: Option<DenialScreen>,
}

impl From<AccessDecision> for AccessCheckResponse {
    fn from(decision: AccessDecision) -> Self {
        let denial = match &decision {
            AccessDecision::Deny { reason } => Some(denial_screen(*reason)),
            _ => None,
        };
        Self { decision, denial }
    }
}

pub fn denial_screen(reason: DenyReason) -> DenialScreen {
    let (title, message) = match reason {
        DenyReason::PageDisabled => (
            "Page unavailable",
            "This page has been turned off by an administrator.",
        ),
        DenyReason::RoleNotAllowed => (
            "Access denied",
            "Your role does not have access to this page.",
        ),
        DenyReason::RoleUnavailable => (
            "Could not verify access",
            "We could not load your account role. Try again or sign in again.",
        ),
    };
    DenialScreen {
        title,
        message,
        actions: vec![
            EscapeAction {
                kind: EscapeKind::Dashboard,
                label: "Go to dashboard",
                href: Some("/dashboard"),
                method: "GET",
            },
            EscapeAction {
                kind: EscapeKind::Back,
                label: "Go back",
                href: None,
                method: "GET",
            },
            EscapeAction {
                kind: EscapeKind::Logout,
                label: "Sign out",
                href: Some("/auth/logout"),
                method: "POST",
            },
        ],
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/check", post(check_access))
        .with_state(state)
}

async fn check_access(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(payload): Json<AccessCheckRequest>,
) -> Json<AccessCheckResponse> {
    let viewer = session::resolve_viewer(&state, &headers).await;
    let decision = state.access_rules.decide(&payload.path, viewer).await;
    if let AccessDecision::Deny { reason } = &decision {
        tracing::info!("Access denied to {} ({:?})", payload.path, reason);
    }
    Json(decision.into())
}
