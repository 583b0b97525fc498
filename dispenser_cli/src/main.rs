mod cli;
mod error_fmt;
mod logging;
mod run;
mod script;

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = dispenser_config::load_file(&cli.config).wrap_err("invalid configuration")?;
    logging::init(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    match cli.cmd {
        Commands::Run {
            show_display,
            max_ticks,
        } => run::run(
            &cfg,
            run::RunOpts {
                show_display,
                max_ticks,
                json: cli.json,
            },
        ),
        Commands::SelfCheck => run::self_check(&cfg, cli.json),
    }
}
