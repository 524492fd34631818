#[tokio::main]
async fn main() -> anyhow::Result<()> {
    signalscope::run().await?;
    Ok(())
}
