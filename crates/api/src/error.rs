use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Internal,
}

#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub request_id: String,
}

impl AppError {
    pub fn with_request_id(self, request_id: &str) -> ApiError {
        ApiError {
            error: self,
            request_id: request_id.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self.error {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Unexpected error".to_string(),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody {
                    code: code.to_string(),
                    message,
                    request_id: self.request_id,
                },
            }),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_with_request_id() {
        let err = AppError::Internal.with_request_id("req_123");
        assert_eq!(err.request_id, "req_123");
    }

    #[test]
    fn test_not_found_response() {
        rt().block_on(async {
            let err = AppError::NotFound("no such poll".to_string()).with_request_id("req_001");
            let (status, json) = body_json(err).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(json["error"]["code"], "not_found");
            assert_eq!(json["error"]["message"], "no such poll");
            assert_eq!(json["error"]["request_id"], "req_001");
        });
    }

    #[test]
    fn test_forbidden_response() {
        rt().block_on(async {
            let err = AppError::Forbidden("bad secret".to_string()).with_request_id("req_002");
            let (status, json) = body_json(err).await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(json["error"]["code"], "forbidden");
            assert_eq!(json["error"]["request_id"], "req_002");
        });
    }

    #[test]
    fn test_unauthorized_response() {
        rt().block_on(async {
            let err =
                AppError::Unauthorized("missing bearer token".to_string()).with_request_id("req_003");
            let (status, json) = body_json(err).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(json["error"]["code"], "unauthorized");
        });
    }

    #[test]
    fn test_internal_response_hides_detail() {
        rt().block_on(async {
            let err = AppError::Internal.with_request_id("req_004");
            let (status, json) = body_json(err).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json["error"]["message"], "Unexpected error");
            assert_eq!(json["error"]["request_id"], "req_004");
        });
    }
}
