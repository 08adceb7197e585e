use genmedia_mcp::Service;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    genmedia_server::run(Service::Avtool).await
}
