use std::sync::Arc;

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use tokio::{io::BufReader, sync::broadcast::error::RecvError};

use ds::{DeliveryEvent, DeliveryService, Transport, WsTransport};
use placidial::{
    cli::Args, companion::Companion, config_page::ConfigResponse, config_store::FileConfigStore,
    console::ConsoleInput, geolocation::FixedLocation,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str()))
        .init();

    let (transport, mut inbound) = WsTransport::connect(&args.peer, args.ack_timeout()).await?;
    let transport: Arc<dyn Transport> = Arc::new(transport);
    let (queue, queue_task) = DeliveryService::start(Arc::clone(&transport), args.retry_policy());

    let companion = Companion::new(
        queue,
        transport,
        Arc::new(FileConfigStore::new(&args.settings_path)),
        Arc::new(FixedLocation::new(args.position())),
        args.config_page.clone(),
    );

    let mut events = companion.queue().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DeliveryEvent::Delivered { message, attempts }) => {
                    info!("Delivered {message} ({attempts} attempt(s))")
                }
                Ok(DeliveryEvent::Abandoned {
                    message, attempts, ..
                }) => error!("Dropped {message} after {attempts} attempt(s)"),
                Ok(DeliveryEvent::Retrying { .. }) => {}
                Err(RecvError::Lagged(n)) => warn!("Missed {n} delivery event(s)"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    {
        let companion = companion.clone();
        tokio::spawn(async move {
            if let Err(e) = companion.on_ready().await {
                error!("Ready handshake failed: {e}");
            }
        });
    }

    info!("Configuration page: {}", companion.config_url());
    info!("Paste the page response (JSON or CANCELLED) on stdin, or `url` to reprint the link");

    let mut console = ConsoleInput::new(BufReader::new(tokio::io::stdin()));
    let mut stdin_open = true;
    loop {
        tokio::select! {
            msg = inbound.recv() => match msg {
                Some(payload) => {
                    let companion = companion.clone();
                    tokio::spawn(async move {
                        if let Err(e) = companion.on_app_message(&payload).await {
                            error!("Error handling watch message: {e}");
                        }
                    });
                }
                None => {
                    info!("Peer link closed");
                    break;
                }
            },
            line = console.next_line(), if stdin_open => match line {
                Some(line) if line.trim() == "url" => {
                    info!("Configuration page: {}", companion.config_url());
                }
                Some(line) => match companion.on_config_closed(&line) {
                    Ok(ConfigResponse::Updated(settings)) => {
                        info!("Saved {} setting(s)", settings.len());
                    }
                    Ok(ConfigResponse::Cancelled) => {}
                    Err(e) => error!("Error applying configuration: {e}"),
                },
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    let status = companion.queue().status().await?;
    if status.sending {
        warn!("Exiting with {} undelivered message(s)", status.pending + 1);
    }
    queue_task.abort();
    Ok(())
}
