//! Command line arguments.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use varquery::config::IpcConfig;
use varquery::{SearchBuilder, SearchSpecification, VarFlags};

#[derive(Parser, Debug)]
#[command(name = "vars")]
#[command(about = "Search the variable server for variables matching the given criteria")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub search: SearchArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search the registry (the default when no subcommand is given)
    Search(SearchArgs),
    /// Serve a fixture registry over local IPC
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Variable name to match exactly
    #[arg(short = 'n', long = "name", conflicts_with = "regex")]
    pub name: Option<String>,

    /// Regular expression to match variable names against
    #[arg(short = 'r', long = "regex")]
    pub regex: Option<String>,

    /// Only variables carrying all of these flags (e.g. volatile,readonly)
    #[arg(short = 'f', long = "flags")]
    pub flags: Option<VarFlags>,

    /// Only variables carrying none of these flags. Supersedes -f
    #[arg(short = 'F', long = "not-flags")]
    pub not_flags: Option<VarFlags>,

    /// Only variables carrying all of these comma separated tags
    #[arg(short = 't', long = "tags")]
    pub tags: Option<String>,

    /// Only variables owned by this instance
    #[arg(short = 'i', long = "instance")]
    pub instance: Option<u32>,

    /// Print each variable's value
    #[arg(short = 'v', long = "values")]
    pub show_value: bool,

    /// Registry server address (host:port)
    #[arg(long, env = IpcConfig::ADDR_ENV_VAR)]
    pub addr: Option<String>,

    /// Search a JSON fixture file in-process instead of a server. Takes precedence over --addr
    #[arg(long)]
    pub fixture: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// JSON fixture file holding the variables to serve
    #[arg(long)]
    pub fixture: PathBuf,

    /// Host to bind to
    #[arg(long, default_value = IpcConfig::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    pub port: u16,
}

impl SearchArgs {
    /// Translate the options into a search specification.
    pub fn to_spec(&self) -> varquery::Result<SearchSpecification> {
        let mut builder = SearchBuilder::new().show_value(self.show_value);

        if let Some(name) = &self.name {
            builder = builder.name_exact(name.as_str());
        } else if let Some(regex) = &self.regex {
            builder = builder.name_regex(regex.as_str());
        }

        if let Some(flags) = self.not_flags {
            builder = builder.without_flags(flags);
        } else if let Some(flags) = self.flags {
            builder = builder.flags(flags);
        }

        if let Some(tags) = &self.tags {
            builder = builder.tags(tags.as_str());
        }

        if let Some(instance) = self.instance {
            builder = builder.instance(instance);
        }

        builder.build()
    }
}
