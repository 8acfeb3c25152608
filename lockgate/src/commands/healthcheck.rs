use anyhow::{Context, Result};
use tokio::time::timeout;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let config = load_config(&cli.config, true)?;

    let url = format!("http://{}/api/info", *config.store.admin.listen);

    let client = reqwest::Client::builder().build()?;

    let mut request = client.get(&url);
    if let Some(token) = &config.store.admin.token {
        request = request.header("x-lockgate-token", token.expose_secret());
    }

    let response = timeout(std::time::Duration::from_secs(5), request.send())
        .await
        .context("Timeout")?
        .context("Failed to send request")?;

    response.error_for_status()?;

    Ok(())
}
