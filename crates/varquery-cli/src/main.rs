//! vars - search the variable server from the command line.
//!
//! With no subcommand, runs one search against a registry server and prints
//! one line per match on stdout. `vars serve` hosts a fixture registry for
//! other `vars` invocations to search.

mod args;
mod serve;

use args::{Cli, Command, SearchArgs};
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, Level};
use tracing_subscriber::FmtSubscriber;
use varquery::config::IpcConfig;
use varquery::{
    ErrorKind, MemoryRegistry, RemoteRegistry, ResultCode, SearchOutcome, VarQueryError,
};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Logs go to stderr so stdout carries only search results
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Some(Command::Serve(args)) => match serve::run(args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                let kind = e.downcast_ref::<VarQueryError>().map(VarQueryError::kind);
                ExitCode::from(kind.map_or(1, exit_code_for_kind))
            }
        },
        Some(Command::Search(args)) => run_search(&args),
        None => run_search(&cli.search),
    }
}

fn run_search(args: &SearchArgs) -> ExitCode {
    let result = search(args);
    if let Err(e) = &result {
        error!("{}", e);
    }
    let code = ResultCode::from_result(&result);
    debug!("Search finished: {:?}", code);
    ExitCode::from(exit_code(code))
}

fn search(args: &SearchArgs) -> varquery::Result<SearchOutcome> {
    let spec = args.to_spec()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match (&args.fixture, &args.addr) {
        (Some(path), _) => {
            let registry = MemoryRegistry::load(path)?;
            varquery::run(&registry, &spec, &mut out)
        }
        (None, Some(addr)) => {
            let registry = RemoteRegistry::connect_to(addr)?;
            varquery::run(&registry, &spec, &mut out)
        }
        (None, None) => Err(VarQueryError::Validation {
            field: "addr".to_string(),
            message: format!(
                "no registry address; pass --addr or set {}",
                IpcConfig::ADDR_ENV_VAR
            ),
        }),
    }
}

/// Process exit status for a search result.
fn exit_code(code: ResultCode) -> u8 {
    match code {
        ResultCode::Success | ResultCode::NoMatches => 0,
        ResultCode::InvalidCriteria => 1,
        ResultCode::InvalidArguments => 2,
        ResultCode::TransportFailure => 3,
        ResultCode::OutputFailure => 4,
    }
}

fn exit_code_for_kind(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation => 1,
        ErrorKind::RegistryInvalidArgument => 2,
        ErrorKind::Transport => 3,
        ErrorKind::Output => 4,
    }
}
