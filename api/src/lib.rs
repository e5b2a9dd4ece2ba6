//! HTTP surface of the authentication and authorization pipeline.
//!
//! [`pipeline::Pipeline`] runs the stages in order; [`middleware_hooks`]
//! adapts it to axum; [`server`] serves the configured routes behind it for
//! development and manual testing.

use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use std::collections::HashMap;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

pub mod error;
pub mod handlers;
pub mod middleware_hooks;
pub mod models;
pub mod pipeline;
pub mod server;


pub use error::{ApiError, ApiResult, ProblemDetails};
pub use middleware_hooks::{AuthState, ResolvedResource, RouteTarget};
pub use pipeline::{Pipeline, PipelineOutcome};
// Re-export server functions for convenience
pub use server::{spawn_server, start_server, start_server_with_config, ApiConfig};

/// Create the router serving every configured route behind the pipeline
pub fn create_router(components: &settings::Components) -> Router {
    let mut routes = HashMap::new();
    let mut protected = Router::new();
    for route in &components.routes {
        debug!(path = %route.path, controller = %route.controller, "Registering route");
        protected = protected.route(&route.path, any(handlers::echo::echo));
        routes.insert(
            route.path.clone(),
            RouteTarget {
                controller: route.controller.clone(),
                action: route.action.clone(),
            },
        );
    }

    // route_layer panics on a router without routes
    if !routes.is_empty() {
        let state = AuthState::new(Pipeline::from_components(components), routes);
        protected = protected.route_layer(middleware::from_fn_with_state(
            state,
            middleware_hooks::auth_middleware,
        ));
    }

    protected
        .route("/health", get(handlers::health::health_check))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
