use anyhow::{Context, Result};
use std::sync::Arc;
use wsfork_gateway::{with_workspace, Gateway};

pub async fn handle_exec(gateway: Arc<dyn Gateway>, command: &str) -> Result<()> {
    let result = with_workspace(gateway, |workspace| async move {
        workspace.exec(command).await
    })
    .await
    .context("Failed to create workspace")?
    .context("Command execution failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
