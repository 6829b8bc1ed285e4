use anyhow::Result;
use chainauth_cli::{App, Cli, ServiceConfig, logging};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let config = ServiceConfig::load(args.config.as_deref())?
        .with_overrides(args.key_dir, args.endpoint.as_deref())?;
    logging::init(&config.logging)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; cancelling");
            on_interrupt.cancel();
        }
    });

    let app = App::new(config);
    match app.run(args.command, &cancel).await {
        Ok(output) => {
            println!("{output}");
            Ok(())
        },
        Err(e) => {
            error!("Command failed: {e:#}");
            Err(e)
        },
    }
}
