use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::extract::{Query, State};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Form, Router};
use clap::Parser;
use rp_passwordless_axum::tower_sessions::{MemoryStore, Session, SessionManagerLayer};
use rp_passwordless_axum::{
    ClaimsPrincipal, InMemoryUserStore, IntegrationError, NoopCustomizeRegisterOptions,
    PasswordlessEndpointOptions, PasswordlessIntegrationOptions, PasswordlessService,
    passwordless_router, step_up_guard,
};
use rp_passwordless_client::{PasswordlessClient, PasswordlessOptions};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use url::Url;

type DemoService = PasswordlessService<InMemoryUserStore, NoopCustomizeRegisterOptions>;

/// Register, sign in and step up against a Passwordless application.
///
/// Pages only describe what the browser side would do; the passkey ceremonies themselves run in
/// the Passwordless JavaScript client.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, env = "DEMO_LISTEN_ADDR", default_value = "127.0.0.1:7212")]
    listen: SocketAddr,
    /// Require an email on registration and use it as an alias.
    #[arg(long, env = "DEMO_REQUIRE_UNIQUE_EMAIL", default_value_t = false)]
    require_unique_email: bool,
    /// Origin browsers reach the demo at, used to build recovery magic links.
    #[arg(long, env = "DEMO_PUBLIC_URL", default_value = "http://127.0.0.1:7212/")]
    public_url: Url,
}

#[derive(Clone)]
struct RecoveryState {
    service: DemoService,
    magic_url: Url,
}

#[derive(Debug, Deserialize)]
struct RecoveryForm {
    email: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .from_env()?
                .add_directive("rp_passwordless_axum=debug".to_owned().parse()?)
                .add_directive("rp_passwordless_client=info".to_owned().parse()?)
                .add_directive("step_up_demo=debug".to_owned().parse()?),
        )
        .init();

    color_eyre::install()?;

    let args = Args::parse();
    let client = PasswordlessClient::new(PasswordlessOptions::from_env()?)?;
    let options = PasswordlessIntegrationOptions::builder()
        .require_unique_email(args.require_unique_email)
        .build();
    let service = PasswordlessService::new(
        client,
        InMemoryUserStore::new(),
        NoopCustomizeRegisterOptions,
        options,
    );

    let elevated = Router::new()
        .route("/authorized/elevated", get(elevated_page))
        .route_layer(from_fn_with_state(
            service.require_step_up("Elevated"),
            step_up_guard,
        ));
    let second_context = Router::new()
        .route("/authorized/second-context", get(second_context_page))
        .route_layer(from_fn_with_state(
            service.require_step_up("SecondContext"),
            step_up_guard,
        ));
    let endpoints = PasswordlessEndpointOptions::builder()
        .enable_register_endpoint(true)
        .build();
    let recovery = Router::new()
        .route("/account/recovery", post(send_recovery))
        .with_state(RecoveryState {
            service: service.clone(),
            magic_url: args
                .public_url
                .join(&endpoints.route(&endpoints.magic_path))?,
        });

    let app = Router::new()
        .route("/", get(index))
        .route("/account/login", get(login_page))
        .route("/account/step-up", get(step_up_page))
        .merge(elevated)
        .merge(second_context)
        .merge(recovery)
        .merge(passwordless_router(service, &endpoints))
        .layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false));

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!(addr = %args.listen, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index(session: Session) -> String {
    match ClaimsPrincipal::from_session(&session).await {
        Ok(Some(principal)) => format!(
            "Signed in as {}.\nClaims: {:?}\n",
            principal.find_first("name").unwrap_or("?"),
            principal.claims
        ),
        Ok(None) => "Not signed in. POST /passwordless-api/register or /passwordless-api/login, \
                     or POST an email form to /account/recovery for a magic link.\n"
            .to_owned(),
        Err(err) => format!("Session unavailable: {err}\n"),
    }
}

async fn login_page(Query(query): Query<BTreeMap<String, String>>) -> String {
    format!(
        "Sign in with a passkey, POST the token to /passwordless-api/login, then continue to {}\n",
        query.get("returnUrl").map_or("/", String::as_str)
    )
}

async fn step_up_page(Query(query): Query<BTreeMap<String, String>>) -> String {
    let purpose = query.get("purpose").map_or("", String::as_str);
    format!(
        "Confirm with your passkey for `{purpose}`, then POST stepUpToken, purpose={purpose} and \
         returnUrl={} as a form to /passwordless-api/step-up\n",
        query.get("returnUrl").map_or("/", String::as_str)
    )
}

async fn send_recovery(
    State(recovery): State<RecoveryState>,
    Form(form): Form<RecoveryForm>,
) -> Result<&'static str, IntegrationError> {
    recovery
        .service
        .send_recovery_link(&form.email, &recovery.magic_url)
        .await?;
    Ok("If an account uses that email, a sign-in link is on its way.\n")
}

async fn elevated_page() -> &'static str {
    "Elevated area: you confirmed your passkey recently.\n"
}

async fn second_context_page() -> &'static str {
    "Second context: a separate step-up purpose.\n"
}
