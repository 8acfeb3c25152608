use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tracing::*;
use lockgate_admin::AdminServer;
use lockgate_core::Services;
use lockgate_protocol_http::AuthProtocolServer;

use crate::config::{load_config, watch_config};

#[cfg(target_os = "linux")]
use sd_notify::NotifyState;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!(%version, "Lockgate");

    let config = load_config(&cli.config, true)?;
    let services = Services::new(config.clone()).await?;

    let mut server_futures: FuturesUnordered<Pin<Box<dyn Future<Output = Result<()>> + Send>>> =
        FuturesUnordered::new();

    server_futures.push(Box::pin(
        AuthProtocolServer::new(&services).run(*config.store.http.listen),
    ));

    if config.store.admin.enable {
        server_futures.push(Box::pin(
            AdminServer::new(&services).run(*config.store.admin.listen),
        ));
    }

    if console::user_attended() {
        info!("--------------------------------------------");
        info!("Lockgate is now running.");
        info!("Authentication endpoint on {}", config.store.http.listen);
        if config.store.admin.enable {
            info!("Admin API on              {}", config.store.admin.listen);
        }
        info!("--------------------------------------------");
    }

    #[cfg(target_os = "linux")]
    if let Ok(true) = sd_notify::booted() {
        use std::time::Duration;
        tokio::spawn(async {
            if let Err(error) = async {
                sd_notify::notify(false, &[NotifyState::Ready])?;
                loop {
                    sd_notify::notify(false, &[NotifyState::Watchdog])?;
                    tokio::time::sleep(Duration::from_secs(15)).await;
                }
                #[allow(unreachable_code)]
                Ok::<(), anyhow::Error>(())
            }
            .await
            {
                error!(?error, "Failed to communicate with systemd");
            }
        });
    }

    drop(config);

    tokio::spawn(watch_config(cli.config.clone(), services.config.clone()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                std::process::exit(1);
            }
            result = server_futures.next() => {
                match result {
                    Some(Err(error)) => {
                        error!(?error, "Server error");
                        std::process::exit(1);
                    },
                    None => break,
                    _ => (),
                }
            }
        }
    }

    info!("Exiting");
    Ok(())
}
