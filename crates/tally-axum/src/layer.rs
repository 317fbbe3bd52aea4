//! Tower layer enforcing a minimum member role.
//!
//! [`RequireRoleLayer`] reads the [`AuthContext`] attached by
//! [`authenticate`](crate::authenticate) and short-circuits with 401 or 403
//! before the inner service runs.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use tally_auth_core::authorize;
use tally_types::MemberRole;

use crate::context::AuthContext;
use crate::error::ApiError;

/// Layer requiring the resolved role to be at or above `required`.
#[derive(Debug, Clone, Copy)]
pub struct RequireRoleLayer {
    required: MemberRole,
}

impl RequireRoleLayer {
    #[must_use]
    pub fn new(required: MemberRole) -> Self {
        Self { required }
    }
}

impl<S> Layer<S> for RequireRoleLayer {
    type Service = RequireRoleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireRoleService {
            inner,
            required: self.required,
        }
    }
}

/// The role-checking service.
#[derive(Debug, Clone)]
pub struct RequireRoleService<S> {
    inner: S,
    required: MemberRole,
}

impl<S> RequireRoleService<S> {
    fn check(&self, req: &Request) -> Result<(), ApiError> {
        let context = req
            .extensions()
            .get::<AuthContext>()
            .ok_or_else(ApiError::unauthorized)?;

        authorize(context.role, self.required).map_err(|e| {
            tracing::debug!(
                member_id = %context.personal_id,
                tenant_id = %context.tenant_id,
                role = %context.role,
                required = %self.required,
                "Role check failed"
            );
            ApiError::from(e)
        })
    }
}

impl<S> Service<Request> for RequireRoleService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = RequireRoleFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        match self.check(&req) {
            Ok(()) => {
                // Call the instance that was driven to readiness
                let clone = self.inner.clone();
                let mut inner = std::mem::replace(&mut self.inner, clone);
                RequireRoleFuture::Calling {
                    future: inner.call(req),
                }
            }
            Err(rejection) => RequireRoleFuture::Rejected {
                response: Some(rejection.into_response()),
            },
        }
    }
}

pin_project! {
    /// Future for [`RequireRoleService`].
    #[project = RequireRoleFutureProj]
    pub enum RequireRoleFuture<F> {
        Rejected {
            response: Option<Response>,
        },
        Calling {
            #[pin]
            future: F,
        },
    }
}

impl<F, E> Future for RequireRoleFuture<F>
where
    F: Future<Output = Result<Response, E>>,
{
    type Output = Result<Response, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            RequireRoleFutureProj::Rejected { response } => match response.take() {
                Some(response) => Poll::Ready(Ok(response)),
                None => panic!("polled after completion"),
            },
            RequireRoleFutureProj::Calling { future } => future.poll(cx),
        }
    }
}
