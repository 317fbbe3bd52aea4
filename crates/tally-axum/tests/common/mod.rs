//! Common test utilities for tally-axum integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Path;
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use serde_json::{json, Value};
use tower::{ServiceBuilder, ServiceExt};
use uuid::Uuid;

use tally_auth_core::{AccountService, AuthConfig, TeamService, TokenIssuer, TracingInvitationSender};
use tally_axum::{
    authenticate, check_resource_limit, release_resource, require_feature,
    track_usage_after_success, AffectedResource, GuardState, RequireRoleLayer, ResourceGate,
};
use tally_billing_core::{
    BillingConfig, QuotaGate, UsageAccountant, UsageRecorder, UsageRecorderHandle,
};
use tally_db::memory::MemoryStores;
use tally_db::AccountRow;
use tally_types::{MemberRole, PlanFeature, ResourceType};

pub const SECRET: &str = "axum-integration-secret-at-least-32-bytes";
pub const PASSWORD: &str = "hunter2-but-longer";

/// Services and router over shared in-memory stores
pub struct App {
    pub stores: MemoryStores,
    pub issuer: TokenIssuer,
    pub accounts: AccountService,
    pub team: TeamService,
    pub router: Router,
    pub handle: Option<UsageRecorderHandle>,
}

impl App {
    pub fn new() -> Self {
        let stores = MemoryStores::new();
        let view = stores.stores();
        let config = AuthConfig::new(SECRET).unwrap();

        let issuer = TokenIssuer::new(&config, &view).unwrap();
        let accounts = AccountService::new(&config, &view, issuer.clone()).unwrap();
        let team = TeamService::new(&config, &view, Arc::new(TracingInvitationSender)).unwrap();
        let (recorder, handle) =
            UsageRecorder::spawn(UsageAccountant::new(&view), &BillingConfig::default());
        let guard = GuardState::new(issuer.clone(), QuotaGate::new(&view), recorder);

        Self {
            stores,
            issuer,
            accounts,
            team,
            router: router(guard),
            handle: Some(handle),
        }
    }

    /// Seed an active, verified account whose password is [`PASSWORD`]
    pub fn account(&self, email: &str) -> AccountRow {
        let hash = bcrypt::hash(PASSWORD, 4).unwrap();
        self.stores.seed_account(email, &hash)
    }

    pub async fn login(&self, email: &str) -> String {
        self.accounts.login(email, PASSWORD).await.unwrap().token.token
    }

    /// Send a request and decode the JSON body (Null when empty)
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let response = self
            .router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

/// Poll until `check` holds; usage is applied by background workers
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn create() -> impl IntoResponse {
    let id = Uuid::new_v4();
    (
        StatusCode::CREATED,
        Extension(AffectedResource(id)),
        Json(json!({ "id": id })),
    )
}

async fn remove(Path(id): Path<Uuid>) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, Extension(AffectedResource(id)))
}

async fn fail() -> StatusCode {
    StatusCode::UNPROCESSABLE_ENTITY
}

async fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

fn router(guard: GuardState) -> Router {
    let track = middleware::from_fn_with_state(guard.recorder.clone(), track_usage_after_success);
    let organizations = ResourceGate::new(guard.clone(), ResourceType::Organization);

    let create_org = post(create).route_layer(
        ServiceBuilder::new()
            .layer(track.clone())
            .layer(RequireRoleLayer::new(MemberRole::Manager))
            .layer(middleware::from_fn_with_state(
                organizations.clone(),
                check_resource_limit,
            )),
    );
    let delete_org = axum::routing::delete(remove).route_layer(
        ServiceBuilder::new()
            .layer(track.clone())
            .layer(RequireRoleLayer::new(MemberRole::Admin))
            .layer(middleware::from_fn_with_state(
                organizations.clone(),
                release_resource,
            )),
    );
    let failing = post(fail).route_layer(
        ServiceBuilder::new()
            .layer(track)
            .layer(middleware::from_fn_with_state(organizations, check_resource_limit)),
    );

    Router::new()
        .route("/organizations", create_org)
        .route("/organizations/{id}", delete_org)
        .route("/failing", failing)
        .route("/unmetered", post(create))
        .route(
            "/settings",
            get(ok).route_layer(RequireRoleLayer::new(MemberRole::Admin)),
        )
        .route(
            "/reports",
            get(ok).route_layer(RequireRoleLayer::new(MemberRole::Manager)),
        )
        .route(
            "/explorer",
            get(ok).route_layer(middleware::from_fn_with_state(
                PlanFeature::FeedbackExplorer,
                require_feature,
            )),
        )
        .layer(middleware::from_fn_with_state(guard, authenticate))
}
