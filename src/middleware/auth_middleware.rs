use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::services::auth_service::{AuthError as TokenError, AuthService};

/// Extension type to store authenticated user ID in request
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

/// Shared secret guarding the operator endpoints
#[derive(Clone)]
pub struct AdminToken(pub Arc<str>);

impl AdminToken {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidTokenFormat)
}

/// Auth middleware that validates JWT tokens and adds user_id to request extensions
pub async fn auth_middleware(
    State(auth_service): State<Arc<dyn AuthService>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&headers)?;

    let user_id = auth_service
        .validate_token(token)
        .await
        .map_err(|e| match e {
            TokenError::TokenExpired => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}

/// Admin middleware that only lets requests carrying the configured admin token through
pub async fn admin_middleware(
    State(admin_token): State<AdminToken>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(&headers)?;

    if token.as_bytes() != admin_token.0.as_bytes() {
        return Err(AuthError::InvalidToken);
    }

    Ok(next.run(request).await)
}

/// Auth middleware errors
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidTokenFormat,
    InvalidToken,
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing authorization token"),
            AuthError::InvalidTokenFormat => (
                StatusCode::UNAUTHORIZED,
                "Invalid authorization header format. Expected: Bearer <token>",
            ),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or malformed token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token has expired"),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::LoginRequest;
    use crate::models::user::CreateUserRequest;
    use crate::repositories::memory::InMemoryUserRepository;
    use crate::services::auth_service::AuthServiceImpl;
    use axum::{Router, body::Body, http::Request, middleware, routing::get};
    use tower::ServiceExt;

    async fn protected_handler(
        axum::Extension(user): axum::Extension<AuthenticatedUser>,
    ) -> impl IntoResponse {
        Json(json!({
            "user_id": user.user_id.to_string(),
        }))
    }

    async fn admin_handler() -> &'static str {
        "admin"
    }

    fn auth_service() -> Arc<dyn AuthService> {
        let repo = Arc::new(InMemoryUserRepository::new());
        Arc::new(AuthServiceImpl::new(repo, "test_secret".to_string()).with_hash_cost(4))
    }

    fn user_app(auth_service: Arc<dyn AuthService>) -> Router {
        Router::new()
            .route("/protected", get(protected_handler))
            .layer(middleware::from_fn_with_state(
                auth_service.clone(),
                auth_middleware,
            ))
            .with_state(auth_service)
    }

    fn admin_app() -> Router {
        Router::new()
            .route("/admin", get(admin_handler))
            .layer(middleware::from_fn_with_state(
                AdminToken::new("operator-secret"),
                admin_middleware,
            ))
    }

    async fn send(app: Router, authorization: Option<&str>, uri: &str) -> (StatusCode, String) {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        let response = app
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_middleware_with_valid_token() {
        let auth_service = auth_service();
        let user = auth_service
            .register(CreateUserRequest {
                name: "Test User".to_string(),
                email: "test@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        let token = auth_service
            .login(LoginRequest {
                email: "test@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        let bearer = format!("Bearer {}", token.token);
        let (status, body) = send(user_app(auth_service), Some(&bearer), "/protected").await;

        assert_eq!(status, StatusCode::OK);
        let body_json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body_json["user_id"], user.id.to_string());
    }

    #[tokio::test]
    async fn test_middleware_without_token() {
        let (status, body) = send(user_app(auth_service()), None, "/protected").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Missing authorization token"));
    }

    #[tokio::test]
    async fn test_middleware_with_invalid_token() {
        let (status, body) = send(
            user_app(auth_service()),
            Some("Bearer invalid_token_here"),
            "/protected",
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid or malformed token"));
    }

    #[tokio::test]
    async fn test_middleware_with_malformed_header() {
        let (status, body) = send(user_app(auth_service()), Some("some_token"), "/protected").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Invalid authorization header format"));
    }

    #[tokio::test]
    async fn test_admin_middleware_accepts_configured_token() {
        let (status, body) = send(admin_app(), Some("Bearer operator-secret"), "/admin").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "admin");
    }

    #[tokio::test]
    async fn test_admin_middleware_rejects_other_tokens() {
        let (missing, _) = send(admin_app(), None, "/admin").await;
        let (wrong, _) = send(admin_app(), Some("Bearer guess"), "/admin").await;

        assert_eq!(missing, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong, StatusCode::UNAUTHORIZED);
    }
}
