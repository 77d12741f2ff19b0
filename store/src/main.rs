#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::io::{self, BufRead, Write};

use store::command::{Command, CommandError, HELP, Outcome};
use store::config::StoreConfig;
use store::storage::{Database, TracingObserver};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PROMPT: &str = "store> ";

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Load configuration from environment variables
    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: order={}, data_directory={}, autosave={}",
        config.order,
        config.data_directory.display(),
        config.autosave
    );

    let mut database = match Database::open(&config.data_directory, config.order) {
        Ok(db) => db.with_observer(TracingObserver),
        Err(e) => {
            tracing::error!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    let mut rng = rand::rng();
    let mut stdout = io::stdout();
    print!("{HELP}{PROMPT}");
    let _ = stdout.flush();

    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read input: {e}");
                break;
            }
        };

        match Command::parse(&line) {
            Ok(command) => {
                let mutating = command.is_mutating();
                match command.execute(&mut database, &mut rng) {
                    Ok(Outcome::Continue(text)) => {
                        print!("{text}");
                        if mutating
                            && config.autosave
                            && let Err(e) = database.save()
                        {
                            tracing::error!("Autosave failed: {e}");
                        }
                    }
                    Ok(Outcome::Quit) => break,
                    Err(e) => println!("Error: {e}"),
                }
            }
            Err(CommandError::Empty) => {}
            Err(e) => println!("Error: {e}"),
        }

        print!("{PROMPT}");
        let _ = stdout.flush();
    }

    tracing::info!("Exiting with {} records", database.len());
}
