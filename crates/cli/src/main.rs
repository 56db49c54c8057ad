use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    hubcap_cli::run().await
}
