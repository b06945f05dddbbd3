use clap::Parser;
use relay_mcp_client::{Cli, run};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("relay-mcp: {err}");
            ExitCode::FAILURE
        }
    }
}
