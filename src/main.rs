use nect_commerce::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    server::run().await
}
