use anyhow::Context;
use clap::Parser;
use ctxpack::cli::{self, Cli};
use std::process::ExitCode;

/// The library surface returns the typed `ContextError` taxonomy (§7); this
/// boundary is the one place that collapses it into a single human-readable
/// diagnostic with a stable short code, per §7's "user-visible behavior".
fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::run(cli).map_err(|e| {
        let code = e.code();
        anyhow::Error::new(e).context(format!("[{code}]"))
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .init();

    match run().with_context(|| "ctxpack failed") {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
