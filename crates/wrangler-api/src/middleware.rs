use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Set by the chat server on every request it proxies to the plugin.
pub const USER_ID_HEADER: &str = "Mattermost-User-Id";

/// The authenticated caller, inserted by [`require_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

pub fn user_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(String::from)
}

/// Reject requests that did not come through the chat server.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let user_id = user_id_from_headers(req.headers()).ok_or(StatusCode::UNAUTHORIZED)?;
    req.extensions_mut().insert(UserId(user_id));
    Ok(next.run(req).await)
}
