use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use nanoid::nanoid;

use crate::state::RequestId;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tag every request with a short id. Handlers thread it into error bodies
/// so an operator can match a failed webhook delivery to its log lines.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let id = format!("req_{}", nanoid!(12));
    req.extensions_mut().insert(RequestId(id.clone()));
    let mut resp = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    resp
}
