#[tokio::main]
async fn main() -> std::io::Result<()> {
    party_server::run_with_config().await
}
