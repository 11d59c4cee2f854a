use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use demos::{MultiTenancyConfiguration, PasswordlessClientBuilder, tenant_from_host};
use rp_passwordless_client::types::PasswordlessUserSummary;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Serves `GET /users` for the tenant named by the first label of the `Host` header.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, env = "DEMO_LISTEN_ADDR", default_value = "127.0.0.1:7001")]
    listen: SocketAddr,
    #[arg(long, env = "PASSWORDLESS_API_URL")]
    api_url: Option<Url>,
}

#[derive(Debug, Clone)]
struct AppState {
    configuration: Arc<MultiTenancyConfiguration>,
    api_url: Option<Url>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .from_env()?
                .add_directive("rp_passwordless_client=debug".to_owned().parse()?)
                .add_directive("multi_tenancy_demo=debug".to_owned().parse()?),
        )
        .init();

    color_eyre::install()?;

    let args = Args::parse();
    let configuration = MultiTenancyConfiguration::from_env()?;
    tracing::info!(tenants = ?configuration.tenants.keys().collect::<Vec<_>>(), "loaded");

    let state = AppState {
        configuration: Arc::new(configuration),
        api_url: args.api_url,
    };
    let app = Router::new()
        .route("/users", get(list_users))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    tracing::info!(addr = %args.listen, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PasswordlessUserSummary>>, (StatusCode, String)> {
    let host = headers
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .unwrap_or_default();
    let tenant = tenant_from_host(host);
    tracing::debug!(tenant, "resolved tenant");

    let mut builder = PasswordlessClientBuilder::new(&state.configuration);
    if let Some(api_url) = state.api_url.clone() {
        builder = builder.with_api_url(api_url);
    }
    let client = builder
        .with_tenant(tenant)
        .and_then(PasswordlessClientBuilder::build)
        .map_err(|err| (StatusCode::NOT_FOUND, err.to_string()))?;

    let users = client.list_users().await.map_err(|err| {
        tracing::error!(error = %err, tenant, "listing users failed");
        (StatusCode::BAD_GATEWAY, err.to_string())
    })?;
    Ok(Json(users))
}
