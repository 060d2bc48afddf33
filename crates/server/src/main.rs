#[tokio::main]
async fn main() -> anyhow::Result<()> {
    engagement_server::start().await
}
