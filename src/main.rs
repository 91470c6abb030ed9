#[cfg(not(feature = "cli"))]
compile_error!("The `fix-urls` binary requires the `cli` feature. Build with `--features cli`.");

use clap::{CommandFactory, Parser};
use std::process;

use fixurls::cli;
use fixurls::cli::app::{Cli, ColorMode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {} // colored auto-detects tty
    }

    let default_filter = match cli.verbose {
        0 => "fixurls=warn",
        1 => "fixurls=info",
        _ => "fixurls=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "fix-urls", &mut std::io::stdout());
        return;
    }

    let mut writer = std::io::stdout();
    let result = cli::execute(&cli, &mut writer).and_then(|_| cli::flush_output(&mut writer));

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}
