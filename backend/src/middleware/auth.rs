//! Authentication middleware
//!
//! Identity lives with the external auth provider; this middleware only
//! validates the JWTs it issues and exposes the claims to handlers.

use axum::{
    extract::Request,
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ErrorResponse;

/// Authenticated user information extracted from the JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    /// Back-office staff may manage stock and sweep reservations
    pub is_staff: bool,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) if header.starts_with("Bearer ") => &header[7..],
        _ => {
            return unauthorized_response("Missing or invalid Authorization header");
        }
    };

    // The middleware runs without router state, so the secret comes from the
    // environment the same way config.rs reads it.
    let jwt_secret = std::env::var("FDP__JWT__SECRET")
        .or_else(|_| std::env::var("FDP_JWT_SECRET"))
        .unwrap_or_else(|_| "development-secret-key".to_string());

    let claims = match decode_jwt(token, &jwt_secret) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let user_id = match uuid::Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    let auth_user = AuthUser {
        user_id,
        is_staff: claims.is_staff,
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// JWT claims structure issued by the auth provider
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    is_staff: bool,
    exp: i64,
    iat: i64,
}

/// Decode and validate a JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, crate::error::AppError> {
    use jsonwebtoken::{decode, errors::ErrorKind, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => crate::error::AppError::TokenExpired,
        _ => crate::error::AppError::InvalidToken,
    })
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: crate::error::ErrorDetail::new("UNAUTHORIZED", message.to_string()),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Guard for staff-only operations (stock intake, sweeps, restocks)
pub fn require_staff(user: &AuthUser) -> Result<(), crate::error::AppError> {
    if user.is_staff {
        Ok(())
    } else {
        Err(crate::error::AppError::InsufficientPermissions)
    }
}

/// Extractor for the authenticated user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

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
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: crate::error::ErrorDetail::new(
                        "UNAUTHORIZED",
                        "Authentication required".to_string(),
                    ),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}
