/// Example: kick a player through the control API
///
/// Reads the bearer token from `OP_FW_TOKEN` and the target server from
/// `OP_FW_SERVERS`.
///
/// Run with: cargo run --example kick_player -- <license> <source>
use opfw_panel::panel::{OnlineStatus, PanelConfig, ServerActions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut args = std::env::args().skip(1);
    let license = args.next().unwrap_or_else(|| "license:0000".to_string());
    let source: u32 = args.next().and_then(|s| s.parse().ok()).unwrap_or(1);

    let config = PanelConfig::from_env();
    let server = config
        .first_server()
        .ok_or_else(|| anyhow::anyhow!("OP_FW_SERVERS is empty"))?
        .to_string();

    let actions = ServerActions::from_config(&config);
    let status = OnlineStatus::online(server, source);

    let result = actions
        .kick_player("license:console", "Console", &license, &status, "demo kick")
        .await;

    tracing::info!("result: {}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
