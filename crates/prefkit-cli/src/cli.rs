use clap::{Parser, Subcommand, ValueEnum};
use prefkit_core::value::RawKind;

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "prefkit",
    about = "Inspect and edit typed settings suites",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Suite to operate on (defaults to `default_suite` from config, then "default").
    #[arg(long, global = true)]
    pub suite: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the stored value of a key.
    Get { name: String },
    /// Store a primitive value under a key.
    Set {
        name: String,
        value: String,
        /// How to interpret VALUE (timestamps are RFC 3339, bytes are base64).
        #[arg(long, value_enum, default_value_t = KindArg::String)]
        kind: KindArg,
    },
    /// Remove a key's persisted value.
    Remove { name: String },
    /// List every persisted key with its value.
    List,
    /// Remove every persisted key in the suite.
    Clear,
    /// Run a typed write/read/remove round-trip against the suite.
    Health,
    /// Print version and exit.
    Version,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Bool,
    String,
    Integer,
    Double,
    Float,
    Timestamp,
    Bytes,
}

impl From<KindArg> for RawKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Bool => RawKind::Bool,
            KindArg::String => RawKind::String,
            KindArg::Integer => RawKind::Integer,
            KindArg::Double => RawKind::Double,
            KindArg::Float => RawKind::Float,
            KindArg::Timestamp => RawKind::Timestamp,
            KindArg::Bytes => RawKind::Bytes,
        }
    }
}
