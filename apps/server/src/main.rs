use anyhow::Context;
use apex::domain::config::ApiConfig;
use apex::kernel::config::load_config;
use apex_server::{Server, init_logger};

#[apex_runtime::main(server)]
async fn main() -> anyhow::Result<()> {
    let cfg: ApiConfig = load_config(Some("server")).context("Critical: Configuration is malformed")?;

    let _log = init_logger(env!("CARGO_PKG_NAME"), &cfg.logging)?;

    Server::builder().config(cfg).build().await?.run().await
}
