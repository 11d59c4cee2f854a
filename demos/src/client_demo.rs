use rp_passwordless_client::{PasswordlessClient, PasswordlessOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .from_env()?
                .add_directive("rp_passwordless_client=info".to_owned().parse()?)
                .add_directive("client_demo=debug".to_owned().parse()?),
        )
        .init();

    color_eyre::install()?;

    let options = PasswordlessOptions::from_env()?;
    tracing::info!(api_url = %options.api_url, secret = %options.masked_secret(), "using");
    let client = PasswordlessClient::new(options)?;

    let count = client.get_users_count().await?;
    tracing::info!(count = count.count, "users");

    for user in client.list_users().await? {
        tracing::info!(
            user_id = %user.user_id,
            credentials = user.credentials_count,
            aliases = user.alias_count,
            "user"
        );

        let aliases = client.list_aliases(&user.user_id).await?;
        for alias in aliases {
            tracing::info!(user_id = %user.user_id, alias = ?alias, "alias");
        }

        let credentials = client.list_credentials(&user.user_id).await?;
        for credential in credentials {
            tracing::info!(
                user_id = %user.user_id,
                device = ?credential.device,
                nickname = ?credential.nickname,
                last_used_at = %credential.last_used_at,
                "credential"
            );
        }
    }

    Ok(())
}
