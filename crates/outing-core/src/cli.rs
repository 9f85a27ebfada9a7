use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "outing",
    version,
    about = "Outing: event dashboard, finder and creation views in the terminal",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// JSON file holding the event records.
    #[arg(long = "events")]
    pub events: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Event list with the first event selected.
    List,

    /// Month grid; defaults to the current month.
    Calendar {
        /// YYYY-MM
        month: Option<String>,

        #[arg(long, default_value_t = 0)]
        prev: u32,

        #[arg(long, default_value_t = 0)]
        next: u32,
    },

    /// Select an event by id.
    Select { id: u64 },

    /// Select the earliest event on a day (YYYY-MM-DD).
    Day { date: String },

    /// Event finder sample with type/date/time filters.
    Find {
        #[arg(long = "type", default_value = "all")]
        kind: String,

        #[arg(long, default_value = "")]
        date: String,

        #[arg(long, default_value = "")]
        time: String,

        /// Apply the filters, then reset them.
        #[arg(long)]
        reset: bool,
    },

    /// Fill in the creation form and validate it.
    Create {
        /// YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,

        /// LAT,LNG picked on the map.
        #[arg(long, conflicts_with = "search")]
        at: Option<String>,

        /// Free-text place search.
        #[arg(long)]
        search: Option<String>,
    },

    /// Show the login password toggle states.
    PasswordToggle {
        #[arg(long, default_value_t = 2)]
        times: u32,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&os(&["outing", "rc.color=off", "list", "rc.map.zoom:12"]))
            .expect("preprocess");
        assert_eq!(pre.cleaned_args, os(&["outing", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.map.zoom".to_string(), "12".to_string()),
            ]
        );
    }

    #[test]
    fn parses_find_filters() {
        let cli = GlobalCli::parse_from(os(&[
            "outing", "--rc", "color=off", "find", "--type", "music", "--time", "14:00",
        ]));
        assert_eq!(cli.rc_overrides[0].key, "color");
        assert_eq!(
            cli.command,
            Some(Command::Find {
                kind: "music".to_string(),
                date: String::new(),
                time: "14:00".to_string(),
                reset: false,
            })
        );
    }

    #[test]
    fn create_rejects_both_location_sources() {
        let parsed = GlobalCli::try_parse_from(os(&[
            "outing", "create", "--at", "55.8,-4.2", "--search", "Hydro",
        ]));
        assert!(parsed.is_err());
    }
}
