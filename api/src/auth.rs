use std::future::Future;

use axum::http::{StatusCode, request::Parts};
use axum::extract::FromRequestParts;
use uuid::Uuid;

/// Stands in for the out-of-scope session layer (§12): the caller's identity is whatever
/// `X-User-Id` says it is. Grounded on `eosin-common::rbac::UserId`'s extractor shape, minus
/// the Keycloak claim verification — real session auth lives in front of this service.
pub struct UserId(pub Uuid);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let header = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Uuid>().ok());

        async move {
            header
                .map(UserId)
                .ok_or((StatusCode::UNAUTHORIZED, "missing or invalid X-User-Id header"))
        }
    }
}
