use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use rp_passwordless_client::types::RegisterTokenResponse;
use tower_sessions::Session;

use crate::customize::CustomizeRegisterOptions;
use crate::error::IntegrationError;
use crate::options::PasswordlessEndpointOptions;
use crate::principal::ClaimsPrincipal;
use crate::service::{
    MagicLinkQuery, PasswordlessAddCredentialRequest, PasswordlessLoginRequest,
    PasswordlessService,
};
use crate::step_up::StepUpRequest;
use crate::store::{PasswordlessRegisterRequest, UserStore};

/// Mounts the Passwordless endpoints. Requires a `tower_sessions::SessionManagerLayer` around the
/// final router.
pub fn passwordless_router<S, C, St>(
    service: PasswordlessService<S, C>,
    endpoints: &PasswordlessEndpointOptions,
) -> Router<St>
where
    S: UserStore,
    C: CustomizeRegisterOptions,
    St: Clone + Send + Sync + 'static,
{
    let mut router = Router::new()
        .route(&endpoints.route(&endpoints.login_path), post(login::<S, C>))
        .route(
            &endpoints.route(&endpoints.add_credential_path),
            post(add_credential::<S, C>),
        )
        .route(&endpoints.route(&endpoints.step_up_path), post(step_up::<S, C>))
        .route(&endpoints.route(&endpoints.logout_path), post(logout))
        .route(&endpoints.route(&endpoints.magic_path), get(magic_link::<S, C>));
    if endpoints.enable_register_endpoint {
        router = router.route(
            &endpoints.route(&endpoints.register_path),
            post(register::<S, C>),
        );
    }
    router.with_state(service)
}

async fn register<S, C>(
    State(service): State<PasswordlessService<S, C>>,
    Json(request): Json<PasswordlessRegisterRequest>,
) -> Result<Json<RegisterTokenResponse>, IntegrationError>
where
    S: UserStore,
    C: CustomizeRegisterOptions,
{
    Ok(Json(service.register_user(request).await?))
}

async fn login<S, C>(
    State(service): State<PasswordlessService<S, C>>,
    session: Session,
    Json(request): Json<PasswordlessLoginRequest>,
) -> Result<StatusCode, IntegrationError>
where
    S: UserStore,
    C: CustomizeRegisterOptions,
{
    service.login_user(&request, &session).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn magic_link<S, C>(
    State(service): State<PasswordlessService<S, C>>,
    session: Session,
    Query(query): Query<MagicLinkQuery>,
) -> Result<Redirect, IntegrationError>
where
    S: UserStore,
    C: CustomizeRegisterOptions,
{
    let return_url = service.magic_link_login(&query, &session).await?;
    Ok(Redirect::to(&return_url))
}

async fn add_credential<S, C>(
    State(service): State<PasswordlessService<S, C>>,
    session: Session,
    Json(request): Json<PasswordlessAddCredentialRequest>,
) -> Result<Json<RegisterTokenResponse>, IntegrationError>
where
    S: UserStore,
    C: CustomizeRegisterOptions,
{
    let principal = ClaimsPrincipal::from_session(&session).await?;
    Ok(Json(
        service.add_credential(request, principal.as_ref()).await?,
    ))
}

async fn step_up<S, C>(
    State(service): State<PasswordlessService<S, C>>,
    session: Session,
    Form(request): Form<StepUpRequest>,
) -> Result<Redirect, IntegrationError>
where
    S: UserStore,
    C: CustomizeRegisterOptions,
{
    let return_url = service.step_up(&request, &session).await?;
    Ok(Redirect::to(&return_url))
}

async fn logout(session: Session) -> Result<StatusCode, IntegrationError> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}
