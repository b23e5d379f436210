mod auth;
mod cli;
mod config;
mod error;
mod output;
mod providers;
mod proxy;
mod report;
mod validation;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, ExitCodeType};
use env_logger::Env;
use log::{error, info, warn};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting GitLab Tools");

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let code = match cli.execute(&cancel).await {
        Ok(code) => code,
        Err(e) => {
            let code = ExitCodeType::from_error(&e);
            if code == ExitCodeType::IllegalArguments {
                error!("Invalid arguments detected: {e}");
            } else {
                error!("An unexpected error occurred: {e}");
            }
            code
        }
    };
    code.into()
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if signal::ctrl_c().await.is_ok() {
        warn!("Interrupted, stopping after the current request");
        cancel.cancel();
    }
}
