//! Tally Axum Integration
//!
//! Axum middleware and extractors that put tenant resolution, role checks
//! and plan quotas in front of handlers.
//!
//! # Overview
//!
//! Within one request the stages run strictly in this order:
//! 1. [`authenticate`] validates the bearer token and resolves the tenant
//! 2. [`RequireRoleLayer`] checks the minimum role
//! 3. [`check_resource_limit`] consults the quota gate
//! 4. the handler performs the write
//! 5. [`track_usage_after_success`] queues the usage update
//!
//! # Quick Start
//!
//! ```ignore
//! use axum::{middleware, routing::post, Router};
//! use tally_axum::{authenticate, check_resource_limit, track_usage_after_success};
//! use tally_axum::{GuardState, RequireRoleLayer, ResourceGate};
//! use tower::ServiceBuilder;
//!
//! let create_qr = post(create_qr_code).route_layer(
//!     ServiceBuilder::new()
//!         .layer(middleware::from_fn_with_state(guard.recorder.clone(), track_usage_after_success))
//!         .layer(RequireRoleLayer::new(MemberRole::Manager))
//!         .layer(middleware::from_fn_with_state(
//!             ResourceGate::new(guard.clone(), ResourceType::QrCode),
//!             check_resource_limit,
//!         )),
//! );
//!
//! let app = Router::new()
//!     .route("/api/v1/qr-codes", create_qr)
//!     .layer(middleware::from_fn_with_state(guard, authenticate));
//! ```

pub mod auth;
pub mod context;
pub mod error;
pub mod extractors;
pub mod layer;
pub mod quota;

pub use auth::{authenticate, bearer_token, GuardState};
pub use context::AuthContext;
pub use error::ApiError;
pub use extractors::{RequireAuth, RequireFeature};
pub use layer::{RequireRoleFuture, RequireRoleLayer, RequireRoleService};
pub use quota::{
    check_resource_limit, release_resource, require_feature, track_usage_after_success,
    AffectedResource, PendingUsage, QuotaContext, ResourceGate,
};
