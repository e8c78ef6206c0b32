//! Fieldvault - transparent field-level encryption for persisted records.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fieldvault::cli::output;
use fieldvault::cli::{execute, Cli};
use fieldvault::error::{ConfigError, Error, KeyError};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_env("FIELDVAULT_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("fieldvault=debug")
        } else {
            EnvFilter::new("fieldvault=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    if let Err(e) = execute(cli.command) {
        let suggestion = match &e {
            Error::Config(ConfigError::NotInitialized) => Some("run: fieldvault init"),
            Error::Config(ConfigError::UnknownTable(_)) => {
                Some("declare the table under [tables] in .fieldvault.toml")
            }
            Error::Key(KeyError::Unknown(_)) => Some("run: fieldvault create-key --name <NAME>"),
            Error::Key(KeyError::ReadFailed { .. }) => {
                Some("check the path under [keys] in .fieldvault.toml")
            }
            Error::EncryptorUnavailable => Some("set encryptor = \"age\" in .fieldvault.toml"),
            _ => None,
        };

        output::error(&e.to_string());
        if let Some(hint) = suggestion {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}
