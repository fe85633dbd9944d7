use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use prdraft::App;
use prdraft::Config;
use prdraft::Outcome;
use prdraft::browser::SystemBrowser;
use prdraft::logging::setup_logging;
use prdraft::ops::git::RealGit;
use prdraft::review::TerminalReviewer;
use prdraft::suggest::OpenAiClient;

#[derive(Parser)]
#[command(name = "prdraft")]
#[command(
    about = "Draft a branch name, commit message and pull request from your local changes, review them, then push and open the PR",
    long_about = None
)]
pub struct Cli {}

#[tokio::main]
async fn main() -> ExitCode {
    let _cli = Cli::parse();

    if let Err(e) = setup_logging() {
        eprintln!("Failed to set up logging: {:#}", e);
    }

    match run().await {
        Ok(Outcome::Completed { .. }) => ExitCode::SUCCESS,
        Ok(Outcome::Aborted) => {
            println!("Bye!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<Outcome> {
    let config = Config::from_env();
    config.validate()?;

    let git = RealGit::open(&std::env::current_dir()?).await?;
    let llm = OpenAiClient::from_config(&config)?;
    let reviewer = TerminalReviewer::new(config.editor.clone());

    let app = App::new(
        config,
        Box::new(git),
        Box::new(llm),
        Box::new(reviewer),
        Box::new(SystemBrowser),
    );
    app.run(&mut std::io::stdout()).await
}
