//! Request-context middleware
//!
//! Authentication happens at the API gateway; requests arrive with the
//! caller's identity already validated and carried in the `X-User-Id` and
//! `X-Department-Id` headers. This middleware parses those headers into a
//! [`CallerContext`] for handlers to consume.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ErrorResponse;

const USER_ID_HEADER: &str = "x-user-id";
const DEPARTMENT_ID_HEADER: &str = "x-department-id";

/// Caller identity forwarded by the gateway
#[derive(Clone, Debug)]
pub struct CallerContext {
    pub user_id: uuid::Uuid,
    pub department_id: uuid::Uuid,
}

/// Middleware that extracts the caller context from gateway headers
pub async fn context_middleware(mut request: Request, next: Next) -> Response {
    let user_id = match header_uuid(&request, USER_ID_HEADER) {
        Ok(id) => id,
        Err(msg) => return unauthorized_response(&msg),
    };

    let department_id = match header_uuid(&request, DEPARTMENT_ID_HEADER) {
        Ok(id) => id,
        Err(msg) => return unauthorized_response(&msg),
    };

    request.extensions_mut().insert(CallerContext {
        user_id,
        department_id,
    });

    next.run(request).await
}

/// Parse a UUID header, reporting which header is missing or malformed
fn header_uuid(request: &Request, name: &str) -> Result<uuid::Uuid, String> {
    let value = request
        .headers()
        .get(name)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| format!("Missing {} header", name))?;

    uuid::Uuid::parse_str(value).map_err(|_| format!("Invalid {} header", name))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: crate::error::ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message_en: message.to_string(),
            message_th: "ไม่ได้รับอนุญาต".to_string(),
            field: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for the current caller
/// Use this in handlers to get the caller context
#[derive(Clone, Debug)]
pub struct CurrentUser(pub CallerContext);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerContext>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: crate::error::ErrorDetail {
                        code: "UNAUTHORIZED".to_string(),
                        message_en: "Caller context required".to_string(),
                        message_th: "ไม่ได้รับอนุญาต".to_string(),
                        field: None,
                    },
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}
