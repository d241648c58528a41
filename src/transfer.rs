use crate::config::HarborConfig;
use crate::docker::TransferTool;
use crate::error::Result;
use tracing::{info, warn};

/// Copies the source image into the testing project as the configured
/// account. Steps run in order and the first failure ends the sequence;
/// anything already pulled or tagged locally is left in place.
pub async fn push_image<T: TransferTool>(config: &HarborConfig, tool: &T) -> Result<()> {
    info!("Pushing image");
    tool.status().await?;

    let source = config.source_image().to_string();
    if let Err(e) = tool.pull(&source).await {
        warn!("Failed to pull image {}: {}", source, e);
        return Err(e);
    }

    if let Err(e) = tool
        .login(&config.account, &config.password, &config.hostname)
        .await
    {
        warn!("Failed to login to {} as {}: {}", config.hostname, config.account, e);
        return Err(e);
    }

    let target = config.target_image().to_string();
    info!("Pushing image {} to {}", source, target);
    tool.tag(&source, &target).await?;
    tool.push(&target).await?;

    Ok(())
}

/// Pulls the image back from the testing project as the configured account.
/// Fails when the account has no read access to the project.
pub async fn pull_image<T: TransferTool>(config: &HarborConfig, tool: &T) -> Result<()> {
    tool.status().await?;
    tool.login(&config.account, &config.password, &config.hostname)
        .await?;

    let target = config.target_image().to_string();
    info!("Pulling image {}", target);
    tool.pull(&target).await
}
