use clap::Parser;

mod cli;
mod commands;
mod envelope;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let json_errors = matches!(cli.format, cli::OutputFormat::Json);

    if let Err(err) = commands::run_command(cli) {
        let envelope = envelope::envelope_for(&err);
        envelope.print(json_errors);
        std::process::exit(envelope.exit_code);
    }
}
