//! Page access enforcement in front of the single-page app shell.
use crate::domain::access::AccessDecision;
use crate::state::SharedState;
use crate::web::{access::AccessCheckResponse, session};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

pub fn login_redirect(return_to: &str) -> Response {
    let location = format!("/login?redirect={}", urlencoding::encode(return_to));
    (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
}

/// Root-relative files such as `/app.js` or `/favicon.ico` are shell assets,
/// not pages.
pub fn is_asset_path(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
}

pub async fn page_guard(
    State(state): State<SharedState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if is_asset_path(&path) {
        return next.run(request).await;
    }
    let viewer = session::resolve_viewer(&state, request.headers()).await;

    match state.access_rules.decide(&path, viewer).await {
        AccessDecision::Allow => next.run(request).await,
        AccessDecision::RedirectToLogin { return_to } => login_redirect(&return_to),
        decision @ AccessDecision::Deny { .. } => {
            tracing::info!("Page {} denied: {:?}", path, decision);
            (StatusCode::FORBIDDEN, Json(AccessCheckResponse::from(decision))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_preserves_attempted_path() {
        let response = login_redirect("/jobs/manage");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?redirect=%2Fjobs%2Fmanage"
        );
    }

    #[test]
    fn only_files_skip_the_guard() {
        assert!(is_asset_path("/app.js"));
        assert!(is_asset_path("/assets/logo.svg"));
        assert!(is_asset_path("/favicon.ico"));
        assert!(!is_asset_path("/jobs/manage"));
        assert!(!is_asset_path("/training/"));
        assert!(!is_asset_path("/.env"));
        assert!(!is_asset_path("/"));
    }
}
