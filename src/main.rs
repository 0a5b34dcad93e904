use forma::cli::output::Output;
use forma::cli::{commands, Cli, Commands};
use forma::types::ExecutionContext;
use forma::utils::logging::init_tracing;
use forma::utils::toml_config::FormaConfig;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    // Logging settings come from the config file when it loads; commands
    // report config errors themselves.
    let logging = FormaConfig::load(&cli.config)
        .map(|config| config.logging)
        .unwrap_or_default();
    if let Err(e) = init_tracing(&logging, cli.verbose) {
        output.warning(&e.to_string());
    }

    match execute(cli, &output).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            output.error(&format!("{:#}", err));
            ExitCode::from(2)
        }
    }
}

async fn execute(cli: Cli, output: &Output) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Validate { plan } => commands::validate(&plan, output),
        Commands::Run {
            plan,
            user,
            session,
            json,
        } => {
            let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let context = ExecutionContext::new(user, session);
            commands::run(&cli.config, &plan, context, json, output).await
        }
        Commands::Agents => commands::agents(&cli.config, output),
        Commands::Config { validate } => commands::config(&cli.config, validate, output),
    }
}
