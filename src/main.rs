use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{io::Write, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vaxstats::{
    config::Config,
    key_numbers::{self, KeyNumberStore, KeyNumbers},
    pipelines::{demand, gavi, mi4a, who_supply},
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Vaccine supply and demand pipelines feeding a shared key-numbers file"
)]
struct Args {
    /// YAML configuration; built-in defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Africa's share of global vaccine demand.
    Demand,
    /// Transitioning countries' share of Gavi vaccine shipments.
    Gavi,
    /// WHO global vaccine supply by continent of production.
    WhoSupply,
    /// MI4A vaccine purchases by year (chart data only).
    Mi4a,
    /// Run demand, gavi and who-supply one after another.
    All,
    /// Merge hand-entered indicators into the key-numbers file.
    Merge {
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value, required = true)]
        set: Vec<(String, String)>,
        /// Key-numbers file; defaults to the configured one.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Print the key-numbers file as it would be written.
    Show {
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{}`", raw))?;
    if key.trim().is_empty() {
        return Err(format!("empty key in `{}`", raw));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Demand => demand::run(&config)?,
        Command::Gavi => gavi::run(&config)?,
        Command::WhoSupply => who_supply::run(&config)?,
        Command::Mi4a => mi4a::run(&config)?,
        Command::All => {
            demand::run(&config)?;
            gavi::run(&config)?;
            who_supply::run(&config)?;
            info!(path = %config.key_numbers_path().display(), "all pipelines finished");
        }
        Command::Merge { set, path } => {
            let path = path.unwrap_or_else(|| config.key_numbers_path());
            let updates: KeyNumbers = set.into_iter().collect();
            key_numbers::merge(&path, &updates)?;
        }
        Command::Show { path } => {
            let store = KeyNumberStore::new(path.unwrap_or_else(|| config.key_numbers_path()));
            let doc = if store.path().exists() {
                store.load()?
            } else {
                KeyNumbers::new()
            };
            let bytes = key_numbers::render(&doc)?;
            std::io::stdout()
                .write_all(&bytes)
                .context("writing key numbers to stdout")?;
        }
    }
    Ok(())
}
