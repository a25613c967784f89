use anyhow::{Context, Result};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::errors::RequestError;

const JWT_EXPIRY_DURATION: time::Duration = time::Duration::days(90);

#[derive(Debug, Serialize, Deserialize)]
struct AuthClaim {
    sub: i64,
    email: String,
    exp: i64,
}

pub struct AuthUser {
    pub id: i64,
}

pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn get_id(&self) -> Option<i64> {
        self.0.as_ref().map(|a| a.id)
    }
}

fn token_from_parts(parts: &Parts) -> Option<&str> {
    let header = parts.headers.get("Authorization")?;
    let header = header.to_str().ok()?;
    header.strip_prefix("Token ")
}

/// Optional authentication. An absent, malformed, or invalid credential all
/// resolve to an anonymous caller rather than a rejection.
#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = match token_from_parts(parts) {
            Some(token) => token,
            None => return Ok(MaybeUser(None)),
        };
        match verify_jwt_token(token) {
            Ok(id) => Ok(MaybeUser(Some(AuthUser { id }))),
            Err(_) => {
                tracing::debug!("ignoring invalid bearer credential");
                Ok(MaybeUser(None))
            }
        }
    }
}

/// Required authentication; missing or invalid credentials reject the
/// request before the handler runs.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync + 'static,
{
    type Rejection = RequestError;
    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = token_from_parts(parts)
            .ok_or(RequestError::NotAuthorized("Need to be authorized"))?;
        let id = verify_jwt_token(token)?;
        Ok(AuthUser { id })
    }
}

pub fn get_jwt_token(id: i64, email: &str) -> Result<String> {
    let jwt_secret = std::env::var("JWT_SECRET").context("Failed to get JWT_SECRET")?;
    let expiry_date = OffsetDateTime::now_utc() + JWT_EXPIRY_DURATION;
    let claim = AuthClaim {
        sub: id,
        email: email.to_string(),
        exp: expiry_date.unix_timestamp(),
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claim,
        &jsonwebtoken::EncodingKey::from_secret(jwt_secret.as_ref()),
    )
    .context("Failed to generate jwt token")
}

pub fn verify_jwt_token(token: &str) -> Result<i64, RequestError> {
    let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| RequestError::ServerError)?;
    let token_data = jsonwebtoken::decode::<AuthClaim>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(jwt_secret.as_ref()),
        &jsonwebtoken::Validation::default(),
    )
    .map_err(|_| RequestError::NotAuthorized("Invalid token"))?;
    let claim = token_data.claims;
    if claim.exp < OffsetDateTime::now_utc().unix_timestamp() {
        return Err(RequestError::NotAuthorized("Token expired"));
    }
    Ok(claim.sub)
}
