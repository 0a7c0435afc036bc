use banter_relay::RelayConfig;
use env_logger::Env;
use log::error;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("[relay] {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = banter_relay::run(config).await {
        error!("[relay] server stopped: {e:#}");
        std::process::exit(1);
    }
}
