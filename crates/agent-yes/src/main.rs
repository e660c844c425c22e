mod cli;
mod inputmux;
mod supervisor;

use clap::Parser;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(&cli.command, Command::Run(args) if args.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| {
                if verbose {
                    "agent_yes=debug,ay_pty=debug,ay_registry=debug".into()
                } else {
                    "agent_yes=info,ay_pty=info,ay_registry=info".into()
                }
            },
        ))
        .init();

    let exit_code = match cli.command {
        Command::Run(args) => supervisor::run(args).await?,
        Command::Send { message } => {
            let cwd = std::env::current_dir()?;
            match supervisor::send(&cwd, &message) {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("{e}");
                    1
                }
            }
        }
    };

    std::process::exit(exit_code);
}
