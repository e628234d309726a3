/*
 * Responsibility
 * - tokio runtime
 * - calls app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    cluster_rest::app::run().await?;
    Ok(())
}
