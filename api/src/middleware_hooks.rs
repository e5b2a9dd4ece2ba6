use authn::request::FORM_URLENCODED;
use authn::{AuthRequest, AuthResponse, RouteMatch};
use axum::{
    body::{to_bytes, Body, HttpBody},
    extract::{MatchedPath, RawPathParams, State},
    http::{header, request::Parts, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult, ProblemDetails, PROBLEM_JSON};
use crate::pipeline::{Pipeline, PipelineOutcome};

/// Default for the largest form body buffered for `access_token` lookup.
pub const MAX_FORM_BYTES: usize = 64 * 1024;

/// Controller and action a route pattern dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub controller: String,
    pub action: Option<String>,
}

/// State shared by the authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub pipeline: Arc<Pipeline>,
    /// Route pattern (as matched by the router) to its target.
    pub routes: Arc<HashMap<String, RouteTarget>>,
    /// Form bodies above this size, or of unknown size, are passed on
    /// without an `access_token` lookup.
    pub max_form_bytes: usize,
}

impl AuthState {
    pub fn new(pipeline: Pipeline, routes: HashMap<String, RouteTarget>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            routes: Arc::new(routes),
            max_form_bytes: MAX_FORM_BYTES,
        }
    }

    pub fn with_max_form_bytes(mut self, max_form_bytes: usize) -> Self {
        self.max_form_bytes = max_form_bytes;
        self
    }
}

/// The resource the request was authorized against, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedResource(pub Option<String>);

/// Authentication and authorization middleware
///
/// Runs the request pipeline before the handler and either answers the
/// request itself or forwards it with the [`Identity`](authn::Identity) and
/// [`ResolvedResource`] stored in the request extensions.
///
/// # Flow
///
/// 1. Buffer form-encoded bodies of known size up to
///    [`AuthState::max_form_bytes`] so `access_token` can be read from them
/// 2. Build an [`AuthRequest`] carrying the matched route and its parameters
/// 3. Run the pipeline on the blocking pool (password hashing is slow)
/// 4. Return the pipeline's response, or call the next service
///
/// Pipeline errors are answered as problem JSON, never as a silent allow.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    matched: Option<MatchedPath>,
    params: Option<RawPathParams>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    info!("AUTH MIDDLEWARE: Processing {} request to {}", parts.method, parts.uri);

    let form_body = is_form(&parts);
    let fits = body
        .size_hint()
        .upper()
        .is_some_and(|len| len <= state.max_form_bytes as u64);
    let (body, form) = if form_body && fits {
        match to_bytes(body, state.max_form_bytes).await {
            Ok(bytes) => {
                let form = bytes.to_vec();
                (Body::from(bytes), form)
            }
            Err(e) => {
                debug!("AUTH MIDDLEWARE: Could not buffer form body: {}", e);
                return ApiError::BadRequest("Request body could not be read".to_string())
                    .into_response();
            }
        }
    } else {
        if form_body {
            debug!("AUTH MIDDLEWARE: Form body too large to buffer; skipping access_token lookup");
        }
        (body, Vec::new())
    };
    let mut request = Request::from_parts(parts, body);

    let route = matched
        .as_ref()
        .and_then(|path| state.routes.get(path.as_str()))
        .map(|target| route_match(target, params.as_ref()));
    let auth_request = build_auth_request(&request, route, form);

    let outcome = match run_pipeline(state.pipeline.clone(), auth_request).await {
        Ok(outcome) => outcome,
        Err(e) => return e.into_response(),
    };

    match outcome {
        PipelineOutcome::Respond(response) => {
            info!(
                "AUTH MIDDLEWARE: Answering {} {} with {}",
                request.method(),
                request.uri().path(),
                response.status()
            );
            to_http_response(response)
        }
        PipelineOutcome::Continue(context) => {
            debug!(
                role = %context.identity().role_id(),
                resource = ?context.resource(),
                "AUTH MIDDLEWARE: Request allowed"
            );
            let resource = ResolvedResource(context.resource().map(str::to_string));
            request.extensions_mut().insert(context.identity());
            request.extensions_mut().insert(resource);
            next.run(request).await
        }
    }
}

async fn run_pipeline(pipeline: Arc<Pipeline>, request: AuthRequest) -> ApiResult<PipelineOutcome> {
    tokio::task::spawn_blocking(move || pipeline.process(&request))
        .await
        .map_err(|e| ApiError::Internal(format!("Pipeline task failed: {}", e)))?
}

fn is_form(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}

/// Route match for `target` with the router's captured parameters.
pub fn route_match(target: &RouteTarget, params: Option<&RawPathParams>) -> RouteMatch {
    let mut route = RouteMatch::new(target.controller.clone());
    if let Some(action) = &target.action {
        route = route.with_action(action.clone());
    }
    for (name, value) in params.into_iter().flat_map(|params| params.iter()) {
        route = route.with_param(name, value);
    }
    route
}

/// Request view handed to the pipeline.
pub fn build_auth_request<B>(
    request: &Request<B>,
    route: Option<RouteMatch>,
    body: Vec<u8>,
) -> AuthRequest {
    let uri = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| request.uri().path());
    let auth_request = AuthRequest::new(request.method().clone(), uri)
        .with_headers(request.headers().clone())
        .with_body(body);
    match route {
        Some(route) => auth_request.with_route(route),
        None => auth_request,
    }
}

/// Converts a pipeline response into an HTTP response.
///
/// Responses without a body get a problem JSON body for their status.
pub fn to_http_response(response: AuthResponse) -> Response {
    let status = response.status();
    let mut http = match response.body() {
        Some(body) => (status, Json(body.clone())).into_response(),
        None => {
            let problem = match status {
                StatusCode::UNAUTHORIZED => ApiError::Unauthorized.problem(),
                StatusCode::FORBIDDEN => ApiError::Forbidden.problem(),
                _ => ProblemDetails::new(status, response.reason(), response.reason()),
            };
            let mut http = (status, Json(problem)).into_response();
            http.headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
            http
        }
    };

    for name in response.headers().keys() {
        http.headers_mut().remove(name);
    }
    for (name, value) in response.headers() {
        http.headers_mut().append(name.clone(), value.clone());
    }
    http
}
