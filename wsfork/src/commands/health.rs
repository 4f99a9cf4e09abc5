use anyhow::{Context, Result};
use wsfork_gateway::Gateway;

pub async fn handle_health(gateway: &dyn Gateway) -> Result<()> {
    let health = gateway
        .health_check()
        .await
        .context("Gateway health check failed")?;
    // Informational only; an unreachable root endpoint is not a health failure.
    let info = gateway.service_info().await.ok();

    let report = serde_json::json!({ "health": health, "service": info });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
