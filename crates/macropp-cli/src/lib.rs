//! The `macropp` binary's guts, split out into a library so integration
//! tests can drive a full run without spawning a subprocess.

pub mod cli;
pub mod config;
pub mod io;
pub mod markers;

use clap::Parser;
use macropp_core::Engine;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Engine(#[from] macropp_core::EngineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let _ = env_logger::Builder::new().filter_level(level).format_timestamp(None).try_init();
}

/// Parses `args` (program name first, as `std::env::args` yields) and runs a
/// full preprocessing pass. Exposed separately from `main` so tests can pass
/// an explicit argument vector instead of reading the process's real one.
pub fn run_args(args: &[String]) -> Result<(), RunError> {
    let cli = cli::Cli::parse_from(args);
    run(&cli)
}

pub fn run(cli: &cli::Cli) -> Result<(), RunError> {
    let resolved = config::resolve(cli)?;
    let mut engine = Engine::new(resolved.spec, resolved.engine);

    for define in &resolved.defines {
        engine.define_from_cli(&define.head, &define.body);
    }

    let output_path = config::output_path(cli);
    let mirror = cli.output_mirror.is_some();
    let mut out = io::output_context(output_path.map(|p| p.as_path()), mirror, cli.crlf)?;

    let main_filename = cli
        .input
        .as_deref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string());
    engine.write_file_start_marker(&mut out, &main_filename)?;

    if let Some(pre) = &cli.pre_include {
        let mut pre_ctx = io::input_context(Some(pre.as_path()))?;
        engine.process(&mut pre_ctx, &mut out)?;
    }

    let mut ctx = io::input_context(cli.input.as_deref())?;
    engine.process(&mut ctx, &mut out)?;

    out.flush()?;
    Ok(())
}
