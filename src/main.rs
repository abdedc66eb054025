use clap::Parser;
use secretkeep::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(ref args) => secretkeep::cli::commands::serve::execute(args).await,
        Commands::GenKey { ref path, force } => {
            secretkeep::cli::commands::gen_key::execute(path, force)
        }
    };

    if let Err(e) = result {
        secretkeep::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
