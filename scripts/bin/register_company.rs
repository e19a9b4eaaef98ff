use anyhow::Context;
use clap::Parser;
use helpers::RpcCompanyRegistry;
use scripts::Args;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    // load env file
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);

    let result = scripts::run(&args, |config| {
        RpcCompanyRegistry::from_config(config).context("failed to build RPC client")
    })
    .await;

    match result {
        Ok(report) => report.log(),
        Err(err) => {
            eprintln!("register-company failed: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt().with_env_filter(filter).init();
}
