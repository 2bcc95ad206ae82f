//! Caller identity, forwarded by the upstream auth gateway as headers.

use axum::{
  async_trait,
  extract::FromRequestParts,
  http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const ADMIN_ROLE: &str = "admin";

/// Authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

/// Authenticated caller holding the admin role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminUser(pub Uuid);

fn user_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
  let raw = headers
    .get(USER_ID_HEADER)
    .ok_or_else(|| ApiError::Unauthorized("missing user identity".to_string()))?;
  let raw = raw
    .to_str()
    .map_err(|_| ApiError::bad_request("invalid user id"))?;
  Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request("invalid user id"))
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    user_id(&parts.headers).map(CurrentUser)
  }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let id = user_id(&parts.headers)?;
    let is_admin = parts
      .headers
      .get(USER_ROLE_HEADER)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|role| role.trim().eq_ignore_ascii_case(ADMIN_ROLE));
    if !is_admin {
      return Err(ApiError::Forbidden("admin role required".to_string()));
    }
    Ok(AdminUser(id))
  }
}
