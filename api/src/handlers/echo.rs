use axum::{
    extract::Extension,
    http::Method,
    Json,
};
use authn::Identity;

use crate::middleware_hooks::ResolvedResource;
use crate::models::EchoResponse;

/// Reports what the pipeline decided about the request.
///
/// Every configured route is served by this handler.
pub async fn echo(
    method: Method,
    identity: Option<Extension<Identity>>,
    resource: Option<Extension<ResolvedResource>>,
) -> Json<EchoResponse> {
    let identity = identity.map(|Extension(identity)| identity).unwrap_or_default();
    let resource = resource.and_then(|Extension(ResolvedResource(resource))| resource);

    Json(EchoResponse {
        role: identity.role_id().to_string(),
        authenticated: !identity.is_guest(),
        resource,
        method: method.to_string(),
    })
}
