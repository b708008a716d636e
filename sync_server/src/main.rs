#[tokio::main]
async fn main() -> std::io::Result<()> {
    sync_server::frameworks::server::run_with_config().await
}
