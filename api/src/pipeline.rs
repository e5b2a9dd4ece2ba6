//! The ordered request pipeline.
//!
//! Stages run in a fixed order: authenticate, post-authenticate, resolve,
//! authorize, post-authorize. Any stage may end the request with a response;
//! the remaining stages are then skipped.

use authn::{AuthContext, AuthRequest, AuthResponse, AuthenticationListener};
use authz::AuthorizationListener;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ApiResult;

/// What the host should do with the request after the pipeline ran.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Hand the request to the application with this context.
    Continue(AuthContext),
    /// Answer with this response instead.
    Respond(AuthResponse),
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    authentication: Arc<AuthenticationListener>,
    authorization: Arc<AuthorizationListener>,
}

impl Pipeline {
    pub fn new(
        authentication: Arc<AuthenticationListener>,
        authorization: Arc<AuthorizationListener>,
    ) -> Self {
        Self {
            authentication,
            authorization,
        }
    }

    pub fn from_components(components: &settings::Components) -> Self {
        Self::new(
            components.authentication.clone(),
            components.authorization.clone(),
        )
    }

    pub fn authentication(&self) -> &AuthenticationListener {
        &self.authentication
    }

    /// Runs every stage over `request`.
    ///
    /// Adapter failures and ACL errors are returned as errors, never turned
    /// into a denial.
    pub fn process(&self, request: &AuthRequest) -> ApiResult<PipelineOutcome> {
        let mut context = AuthContext::new();

        if let Some(response) = self.authentication.authenticate(request, &mut context)? {
            return Ok(PipelineOutcome::Respond(response));
        }
        post_authenticate(&mut context);

        self.authorization.resolve(request, &mut context);
        let authorized = self.authorization.authorize(request, &mut context)?;

        match post_authorize(&mut context, authorized) {
            Some(response) => Ok(PipelineOutcome::Respond(response)),
            None => Ok(PipelineOutcome::Continue(context)),
        }
    }
}

/// Turns an invalid authentication result into a provisional 401.
pub fn post_authenticate(context: &mut AuthContext) {
    let Some(result) = context.authentication_result() else {
        return;
    };
    if result.is_valid() {
        return;
    }
    debug!(messages = ?result.messages(), "Authentication result invalid; provisional 401");
    context
        .response_mut()
        .set_status(StatusCode::UNAUTHORIZED, "Unauthorized");
}

/// Settles the provisional response once the authorization verdict is known.
///
/// An authorized request clears any earlier provisional status. A denied one
/// keeps a provisional 401 (and its challenge headers) or becomes a 403.
pub fn post_authorize(context: &mut AuthContext, authorized: bool) -> Option<AuthResponse> {
    let role = context.identity().role_id().to_string();
    let resource = context.resource().unwrap_or_default().to_string();

    if authorized {
        if context.response().status() != StatusCode::OK {
            debug!(
                role = %role,
                status = %context.response().status(),
                "Authorized; clearing provisional status"
            );
            context.response_mut().reset();
        }
        return None;
    }

    if context.response().status() == StatusCode::UNAUTHORIZED {
        info!(role = %role, resource = %resource, "Request requires authentication");
    } else {
        warn!(role = %role, resource = %resource, "Request forbidden");
        context
            .response_mut()
            .set_status(StatusCode::FORBIDDEN, "Forbidden");
    }
    Some(context.response().clone())
}
