mod cli;
mod commands;
mod config;
mod paths;
mod prompt;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::{Config, Settings};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config: Config,
    pub settings: Settings,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "saltpipe", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load()?;
    let settings = Settings::resolve(&cli, &config);
    let ctx = Context {
        quiet: cli.quiet,
        config,
        settings,
    };

    match cli.command {
        Command::State { target, states } => commands::state::apply(&ctx, &target, &states),
        Command::Highstate { target, print } => commands::state::highstate(&ctx, &target, print),
        Command::Orchestrate { name } => commands::state::orchestrate(&ctx, &name),
        Command::Sync { target, print } => commands::state::sync(&ctx, &target, print),
        Command::Cmd {
            target,
            command,
            no_check,
        } => commands::exec::cmd(&ctx, &target, &command, !no_check),
        Command::Run {
            target,
            function,
            args,
            print,
        } => commands::exec::function(&ctx, &target, &function, &args, print),
        Command::Keygen { host, keysize } => commands::provision::keygen(&ctx, &host, keysize),
        Command::Metadata {
            host,
            classes,
            params,
            master,
        } => commands::provision::metadata(&ctx, &master, &host, &classes, &params),
        Command::Minions { target } => commands::query::minions(&ctx, &target),
        Command::Pillar { target, key } => commands::query::pillar(&ctx, &target, &key),
        Command::Grain { target, key } => commands::query::grain(&ctx, &target, &key),
        Command::Completions { .. } => Ok(()),
    }
}

fn report_error(err: &anyhow::Error) {
    ui::error(&format!("{err:#}"));
    if let Some(salt_err) = err.downcast_ref::<saltkit::Error>() {
        let category = salt_err.category();
        ui::dim(&format!("{}: {}", category.description(), category.advice()));
    }
}
