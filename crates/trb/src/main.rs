use std::sync::Arc;

use trb_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), trb_core::Error> {
    trb_core::logging::init("trb")?;

    let cfg = Arc::new(Config::load()?);

    trb_telegram::router::run_webhook_server(cfg)
        .await
        .map_err(|e| trb_core::Error::External(format!("webhook server failed: {e}")))?;

    Ok(())
}
