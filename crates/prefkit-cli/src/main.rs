mod cli;
mod config;
mod storage;

use chrono::{DateTime, Utc};
use clap::Parser;
use color_eyre::Result;
use prefkit_core::value::RawValue;
use prefkit_defaults::{register_secure_setting, Key, OptionalKey, Suite};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand};

/// Payload written by `prefkit health` to exercise the secure archive path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct HealthProbe {
    issued_at: DateTime<Utc>,
    note: String,
}

register_secure_setting!(HealthProbe, "health_probe");

fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    let suite_name = config.suite_name(cli.suite.as_deref());

    match cli.command {
        Command::Version => print_version(),
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        command => {
            let suite = storage::suite_from_config(&config, &suite_name)?;
            run(command, &suite)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("prefkit {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

fn run(command: Command, suite: &Suite) -> Result<()> {
    match command {
        Command::Get { name } => match suite.store().get(&name)? {
            Some(value) => println!("{}", render(&value)),
            None => color_eyre::eyre::bail!("{name} is not set in suite {}", suite.name()),
        },
        Command::Set { name, value, kind } => {
            let value = RawValue::parse(kind.into(), &value)?;
            suite.store().set(&name, value)?;
        }
        Command::Remove { name } => suite.store().remove(&name)?,
        Command::List => {
            for line in list_lines(suite)? {
                println!("{line}");
            }
        }
        Command::Clear => {
            let removed = suite.clear();
            println!("Removed {removed} entries from {}", suite.name());
        }
        Command::Health => {
            run_suite_health(suite)?;
            println!("Suite {}: ok", suite.name());
        }
        Command::Version | Command::Config(_) => {}
    }
    Ok(())
}

fn render(value: &RawValue) -> String {
    format!("{}\t{value}", value.kind())
}

fn list_lines(suite: &Suite) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for name in suite.keys() {
        if let Some(value) = suite.store().get(&name)? {
            lines.push(format!("{name}\t{}", render(&value)));
        }
    }
    Ok(lines)
}

/// Write, read back, and remove a native and a secure value through typed keys.
fn run_suite_health(suite: &Suite) -> Result<()> {
    let counter = Key::in_suite("health/counter", 0_i64, suite);
    counter.set(&1);
    let counted = counter.get();
    counter.reset();
    if counted != 1 || counter.get() != 0 {
        color_eyre::eyre::bail!("native round-trip failed");
    }

    let probe_key = OptionalKey::<HealthProbe>::in_suite("health/probe", suite);
    let probe = HealthProbe {
        issued_at: Utc::now(),
        note: "ok".to_string(),
    };
    probe_key.set(Some(&probe));
    let round_trip = probe_key.get();
    probe_key.remove();

    if round_trip.as_ref() != Some(&probe) {
        color_eyre::eyre::bail!("secure round-trip failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::KindArg;

    #[test]
    fn health_check_with_test_suite_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let suite = storage::test_suite(dir.path(), "health");
        run_suite_health(&suite).expect("health check should succeed");
        assert!(suite.keys().is_empty(), "health check must clean up");
    }

    #[test]
    fn set_then_list_renders_kind_and_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let suite = storage::test_suite(dir.path(), "app");

        run(
            Command::Set {
                name: "retryCount".into(),
                value: "5".into(),
                kind: KindArg::Integer,
            },
            &suite,
        )
        .expect("set");
        run(
            Command::Set {
                name: "enabled".into(),
                value: "true".into(),
                kind: KindArg::Bool,
            },
            &suite,
        )
        .expect("set");

        assert_eq!(
            list_lines(&suite).expect("list"),
            vec![
                "enabled\tbool\ttrue".to_string(),
                "retryCount\tinteger\t5".to_string(),
            ]
        );

        run(Command::Clear, &suite).expect("clear");
        assert!(list_lines(&suite).expect("list").is_empty());
    }

    #[test]
    fn rejects_unparseable_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let suite = storage::test_suite(dir.path(), "app");
        let result = run(
            Command::Set {
                name: "retryCount".into(),
                value: "many".into(),
                kind: KindArg::Integer,
            },
            &suite,
        );
        assert!(result.is_err());
        assert!(suite.keys().is_empty());
    }

    #[test]
    fn get_of_missing_key_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let suite = storage::test_suite(dir.path(), "app");
        let result = run(
            Command::Get {
                name: "absent".into(),
            },
            &suite,
        );
        assert!(result.is_err());
    }
}
