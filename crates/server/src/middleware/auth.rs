//! Bearer-token guard for the editorial endpoints.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use deployment::Deployment;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DeploymentImpl, error::ApiError};

/// Roles allowed to read dashboards and trigger integrations.
pub const EDITOR_ROLES: [&str; 2] = ["editor", "administrator"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: u64,
}

impl Claims {
    pub fn can_edit(&self) -> bool {
        EDITOR_ROLES.contains(&self.role.as_str())
    }
}

/// Who passed the guard, inserted into the request extensions.
#[derive(Debug, Clone)]
pub enum Caller {
    User(Claims),
    Bypass,
}

impl Caller {
    pub fn name(&self) -> &str {
        match self {
            Caller::User(claims) => &claims.sub,
            Caller::Bypass => "debug-bypass",
        }
    }
}

pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn decode_claims(token: &str, secret: &SecretString) -> Result<Claims, ApiError> {
    let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());
    jsonwebtoken::decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))
        .map(|data| data.claims)
        .map_err(|e| {
            debug!(error = %e, "Rejected bearer token");
            ApiError::Unauthorized("Invalid or expired token".to_string())
        })
}

pub async fn require_editor(
    State(deployment): State<DeploymentImpl>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = &deployment.config().auth;

    let caller = if auth.debug_bypass {
        Caller::Bypass
    } else {
        let secret = auth
            .jwt_secret
            .as_ref()
            .ok_or_else(|| ApiError::Unauthorized("Authentication is not configured".to_string()))?;
        let token = extract_token(request.headers())
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
        let claims = decode_claims(token, secret)?;
        if !claims.can_edit() {
            return Err(ApiError::Forbidden(format!(
                "Role '{}' may not access this resource",
                claims.role
            )));
        }
        Caller::User(claims)
    };

    debug!(caller = caller.name(), path = %request.uri().path(), "Authorized request");
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header};

    use super::*;

    fn token(secret: &str, role: &str, exp: u64) -> String {
        let claims = Claims {
            sub: "ana".to_string(),
            role: role.to_string(),
            exp,
        };
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> u64 {
        (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as u64
    }

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_token(&headers), Some("abc.def"));
    }

    #[test]
    fn test_decode_claims() {
        let secret = SecretString::from("s3cret".to_string());

        let claims = decode_claims(&token("s3cret", "editor", far_future()), &secret).unwrap();
        assert_eq!(claims.sub, "ana");
        assert!(claims.can_edit());

        let subscriber = decode_claims(&token("s3cret", "subscriber", far_future()), &secret).unwrap();
        assert!(!subscriber.can_edit());

        assert!(decode_claims(&token("other", "editor", far_future()), &secret).is_err());
        assert!(decode_claims(&token("s3cret", "editor", 1_000), &secret).is_err());
    }
}
