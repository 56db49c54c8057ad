pub mod examples;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hubcap_agent::llm::LlmClient;
use hubcap_agent::runtime::{Orchestrator, QueryReport};
use hubcap_agent::OpenAiClient;
use hubcap_core::config::{AppConfig, LoadOptions};
use hubcap_crm::client::CrmApi;
use hubcap_crm::HubSpotClient;
use hubcap_notify::{Notifier, SmtpNotifier};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Debug, Parser)]
#[command(
    name = "hubcap",
    about = "Natural-language HubSpot operations from your terminal",
    long_about = "Translate a free-text request into a HubSpot CRM operation, execute it, \
                  and email a summary of the outcome.",
    after_help = "Examples:\n  hubcap \"Create a contact for John Doe with email john@test.com\"\n  \
                  hubcap --autonomous \"Update deal Big Sale with amount 75000\"\n  \
                  hubcap    (interactive mode)"
)]
pub struct Cli {
    /// Free-text query; omit it to start the interactive loop.
    #[arg(value_name = "QUERY")]
    pub query: Vec<String>,
    /// Path to the JSON configuration file (default: config.json).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Resolve objects by natural key (email, deal name, domain) instead of
    /// requiring explicit ids.
    #[arg(long)]
    pub autonomous: bool,
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(LoadOptions {
        config_path: cli.config.clone(),
        require_file: true,
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::from(1);
        }
    };

    init_logging(&config);

    let llm = match OpenAiClient::from_config(&config.openai) {
        Ok(llm) => llm,
        Err(error) => {
            eprintln!("error: could not initialize language model client: {error}");
            return ExitCode::from(1);
        }
    };
    let crm = HubSpotClient::from_config(&config.hubspot);
    let notifier = match SmtpNotifier::from_config(&config.email) {
        Ok(notifier) => notifier,
        Err(error) => {
            eprintln!("error: could not initialize mail transport: {error}");
            return ExitCode::from(1);
        }
    };

    let orchestrator =
        Orchestrator::new(llm, crm, notifier, config.email.recipient().to_string());

    if cli.query.is_empty() {
        repl(&orchestrator, cli.autonomous).await
    } else {
        let query = cli.query.join(" ");
        let report = process(&orchestrator, &query, cli.autonomous).await;
        print_report(&report);
        ExitCode::SUCCESS
    }
}

async fn process<L, C, N>(
    orchestrator: &Orchestrator<L, C, N>,
    query: &str,
    autonomous: bool,
) -> QueryReport
where
    L: LlmClient,
    C: CrmApi,
    N: Notifier,
{
    if autonomous {
        orchestrator.process_autonomous(query).await
    } else {
        orchestrator.process(query).await
    }
}

async fn repl<L, C, N>(orchestrator: &Orchestrator<L, C, N>, autonomous: bool) -> ExitCode
where
    L: LlmClient,
    C: CrmApi,
    N: Notifier,
{
    println!("hubcap interactive mode");
    println!("Type a CRM request, `examples` for query ideas, or `exit` to stop.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("query> ");
        let _ = std::io::stdout().flush();

        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                match input.to_ascii_lowercase().as_str() {
                    "exit" | "quit" | "q" => break,
                    "examples" => {
                        println!("{}", examples::EXAMPLES);
                        continue;
                    }
                    _ => {}
                }

                let report = process(orchestrator, input, autonomous).await;
                print_report(&report);
            }
            Ok(None) => break,
            Err(error) => {
                eprintln!("error: could not read input: {error}");
                break;
            }
        }
    }

    println!("Goodbye.");
    ExitCode::SUCCESS
}

fn print_report(report: &QueryReport) {
    let rule = "-".repeat(70);
    println!("{rule}");
    println!("Operation: {}", report.operation);
    println!("Object Type: {}", report.object_type.as_deref().unwrap_or("n/a"));
    if !report.properties.is_empty() {
        match serde_json::to_string_pretty(&report.properties) {
            Ok(pretty) => println!("Properties: {pretty}"),
            Err(_) => println!("Properties: <unprintable>"),
        }
    }
    println!();
    println!("{}", report.response);
    println!("{rule}");
}

fn init_logging(config: &AppConfig) {
    use hubcap_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}
