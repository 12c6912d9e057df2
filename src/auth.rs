use std::future::{ready, Ready};
use std::num::ParseIntError;

use actix_web::{dev::Payload, http::header::HeaderValue, web, FromRequest, HttpRequest};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::Config;
use crate::error::ApiError;
use crate::schemas::UserId;

type HmacSha256 = Hmac<Sha256>;

/// The caller behind a request, resolved from a signed bearer token of the
/// form `<user-id>.<expiry-unix>.<hex signature>`. Token issuance lives with
/// the identity service; this crate only verifies.
#[derive(Debug, PartialEq)]
pub struct AuthenticatedUser(pub UserId);

impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(request: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(request))
    }
}

fn authenticate(request: &HttpRequest) -> Result<AuthenticatedUser, ApiError> {
    let config = request
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| ApiError::Authorization("authentication is not configured".to_string()))?;
    let header = request
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .map(HeaderValue::to_str)
        .transpose()
        .ok()
        .flatten()
        .ok_or_else(|| ApiError::Authorization("missing authorization header".to_string()))?;
    let token = header.strip_prefix("Bearer ").unwrap_or(header);
    let user = verify_token(&config.auth_secret, token)?;
    Ok(AuthenticatedUser(user))
}

pub fn verify_token(secret: &str, token: &str) -> Result<UserId, ApiError> {
    let invalid = || ApiError::Authorization("invalid authorization token".to_string());

    let mut parts = token.rsplitn(3, '.');
    let signature = parts.next().ok_or_else(invalid)?;
    let expiry = parts.next().ok_or_else(invalid)?;
    // User ids are opaque and may themselves contain dots.
    let user_id = parts.next().ok_or_else(invalid)?;
    if user_id.is_empty() {
        return Err(invalid());
    }

    let expires_at: i64 = expiry.parse().map_err(|_| invalid())?;
    if expires_at <= Utc::now().timestamp() {
        return Err(ApiError::Authorization("authorization token expired".to_string()));
    }

    let signature = signature
        .chars()
        .collect::<Vec<_>>()
        .chunks(2)
        .map(|pair| u8::from_str_radix(&String::from_iter(pair), 16))
        .collect::<Result<Vec<u8>, ParseIntError>>()
        .map_err(|_| invalid())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ApiError::Authorization("authentication is not configured".to_string()))?;
    mac.update(format!("{}.{}", user_id, expires_at).as_bytes());
    mac.verify_slice(&signature).map_err(|_| invalid())?;

    Ok(user_id.to_string())
}

/// Produces a token `verify_token` accepts. Used by tests and operator
/// tooling; real clients get theirs from the identity service.
pub fn mint_token(secret: &str, user_id: &str, expires_at: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{}.{}", user_id, expires_at).as_bytes());
    let signature = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect::<String>();
    format!("{}.{}.{}", user_id, expires_at, signature)
}
