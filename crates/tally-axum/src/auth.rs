//! Bearer authentication middleware.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use tally_auth_core::{TeamResolver, TokenIssuer};
use tally_billing_core::{QuotaGate, UsageRecorder};

use crate::context::AuthContext;
use crate::error::ApiError;

/// Everything the guard middleware needs, cheap to clone per request.
#[derive(Clone, Debug)]
pub struct GuardState {
    pub issuer: TokenIssuer,
    pub resolver: TeamResolver,
    pub quota: QuotaGate,
    pub recorder: UsageRecorder,
}

impl GuardState {
    #[must_use]
    pub fn new(issuer: TokenIssuer, quota: QuotaGate, recorder: UsageRecorder) -> Self {
        let resolver = issuer.resolver().clone();
        Self {
            issuer,
            resolver,
            quota,
            recorder,
        }
    }
}

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Validate the bearer token and attach an [`AuthContext`].
///
/// The tenant is resolved again on every request so membership and role
/// changes apply without waiting for the token to expire. A missing or
/// unusable token is rejected with 401 before any handler runs.
pub async fn authenticate(
    State(guard): State<GuardState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).ok_or_else(ApiError::unauthorized)?;
    let claims = guard.issuer.validate_token(token)?;

    let tenant = guard.resolver.resource_tenant_for(claims.member_id).await?;
    let context = AuthContext::from_claims(claims, tenant);

    tracing::debug!(
        member_id = %context.personal_id,
        tenant_id = %context.tenant_id,
        role = %context.role,
        "Authenticated request"
    );

    req.extensions_mut().insert(context);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
