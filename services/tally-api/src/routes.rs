//! Router assembly

use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use tally_axum::{
    authenticate, check_resource_limit, release_resource, track_usage_after_success,
    RequireRoleLayer, ResourceGate,
};
use tally_types::{MemberRole, ResourceType};

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();
    let guard = state.guard.clone();

    let track = middleware::from_fn_with_state(guard.recorder.clone(), track_usage_after_success);
    let team_members = ResourceGate::new(guard.clone(), ResourceType::TeamMember);
    let admin = || RequireRoleLayer::new(MemberRole::Admin);
    let viewer = || RequireRoleLayer::new(MemberRole::Viewer);

    // Inviting counts against the team member limit; removing a member or
    // cancelling a pending invitation gives the seat back
    let invite = post(handlers::invite_member).route_layer(
        ServiceBuilder::new()
            .layer(track.clone())
            .layer(admin())
            .layer(middleware::from_fn_with_state(
                team_members.clone(),
                check_resource_limit,
            )),
    );
    let remove_member = delete(handlers::remove_member).route_layer(
        ServiceBuilder::new()
            .layer(track.clone())
            .layer(admin())
            .layer(middleware::from_fn_with_state(
                team_members.clone(),
                release_resource,
            )),
    );
    let cancel_invitation = delete(handlers::cancel_invitation).route_layer(
        ServiceBuilder::new()
            .layer(track)
            .layer(admin())
            .layer(middleware::from_fn_with_state(team_members, release_resource)),
    );

    // Authenticated API v1 routes
    let protected = Router::new()
        .route("/auth/me", get(handlers::me))
        .route(
            "/auth/deactivation",
            post(handlers::request_deactivation).delete(handlers::cancel_deactivation),
        )
        .route(
            "/team/members",
            get(handlers::list_members).route_layer(viewer()),
        )
        .route("/team/members/{id}", remove_member)
        .route(
            "/team/members/{id}/role",
            put(handlers::update_member_role).route_layer(admin()),
        )
        .route(
            "/team/invitations",
            get(handlers::list_invitations)
                .route_layer(admin())
                .merge(invite),
        )
        .route("/team/invitations/{id}", cancel_invitation)
        .route(
            "/team/invitations/accept",
            post(handlers::accept_invitation),
        )
        .route("/usage", get(handlers::get_usage).route_layer(viewer()))
        .route_layer(middleware::from_fn_with_state(guard, authenticate));

    // Token endpoints check credentials themselves
    let public = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh));

    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Outermost first
    let middleware = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .nest("/api/v1", protected.merge(public))
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}
