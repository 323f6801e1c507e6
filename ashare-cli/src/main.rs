//! Ashare CLI: fetch, inspect and look up A-share quotes.
//!
//! Commands:
//! - `fetch`: fetch bars for one or more symbols, write cache and archive
//! - `show`: print the cached table for a symbol
//! - `name`: look up a symbol's display name
//! - `search`: find symbols by company name
//! - `interactive`: search, pick a stock and a frequency, fetch 5 bars

use anyhow::{bail, Context, Result};
use ashare_core::data::{StockDirectory, StockListing};
use ashare_core::download::{download_symbols, StdoutProgress};
use ashare_core::{AshareConfig, CanonicalSymbol, DataManager, Granularity, QuoteTable};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Bars fetched per interactive pick.
const INTERACTIVE_COUNT: usize = 5;

#[derive(Parser)]
#[command(name = "ashare", about = "Ashare CLI: A-share quote fetcher with cache and archive")]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the cache directory.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Override the archive root directory.
    #[arg(long, global = true)]
    stock_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch bars and write the cache and today's archive.
    Fetch {
        /// Symbols in any accepted spelling (300718, sz300718, 300718.XSHE).
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Frequency: 1d, 1w, 1M, 1m, 5m, 15m, 30m, 60m.
        #[arg(short, long, default_value = "1d")]
        frequency: Granularity,

        /// Number of bars.
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,

        /// Only bars on or before this date (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Fetch even if today's data is already cached.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print the cached table for a symbol.
    Show {
        symbol: String,

        #[arg(short, long, default_value = "1d")]
        frequency: Granularity,
    },
    /// Look up a symbol's display name.
    Name { symbol: String },
    /// Find listed A-shares whose name contains a keyword.
    Search { keyword: String },
    /// Search, pick a stock and a frequency, then fetch.
    Interactive,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Fetch {
            symbols,
            frequency,
            count,
            end,
            force,
        } => run_fetch(&config, &symbols, frequency, count, end, force),
        Commands::Show { symbol, frequency } => run_show(&config, &symbol, frequency),
        Commands::Name { symbol } => run_name(&config, &symbol),
        Commands::Search { keyword } => run_search(&config, &keyword),
        Commands::Interactive => run_interactive(&config),
    }
}

fn load_config(cli: &Cli) -> Result<AshareConfig> {
    let mut config = AshareConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(dir) = &cli.stock_dir {
        config.stock_dir = dir.clone();
    }
    Ok(config)
}

fn run_fetch(
    config: &AshareConfig,
    symbols: &[String],
    frequency: Granularity,
    count: usize,
    end: Option<String>,
    force: bool,
) -> Result<()> {
    if count == 0 {
        bail!("--count must be at least 1");
    }
    let as_of = end
        .as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("--end must be YYYY-MM-DD")?;

    let manager = DataManager::from_config(config)?;
    let sym_refs: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();

    let summary = download_symbols(
        &manager,
        &sym_refs,
        frequency,
        count,
        as_of,
        force,
        &StdoutProgress,
    );

    for saved in &summary.saved {
        println!("\n{} {}", saved.symbol, saved.granularity.label());
        print_table(&saved.table)?;
    }

    if !summary.all_succeeded() {
        for (sym, err) in &summary.errors {
            eprintln!("Error for {sym}: {err}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn run_show(config: &AshareConfig, symbol: &str, frequency: Granularity) -> Result<()> {
    let manager = DataManager::from_config(config)?;
    match manager.load_cached(symbol, frequency)? {
        Some(table) => print_table(&table),
        None => bail!(
            "no cached {} data for {}",
            frequency,
            CanonicalSymbol::normalize(symbol)
        ),
    }
}

fn run_name(config: &AshareConfig, symbol: &str) -> Result<()> {
    let directory = StockDirectory::from_config(config)?;
    let symbol = CanonicalSymbol::normalize(symbol);
    match directory.stock_name(&symbol) {
        Some(name) => println!("{symbol}  {name}"),
        None => bail!("unknown stock {symbol}"),
    }
    Ok(())
}

fn run_search(config: &AshareConfig, keyword: &str) -> Result<()> {
    let directory = StockDirectory::from_config(config)?;
    let hits = directory.search(keyword);
    if hits.is_empty() {
        println!("No matches for '{keyword}'");
    }
    print_listings(&hits);
    Ok(())
}

fn run_interactive(config: &AshareConfig) -> Result<()> {
    let manager = DataManager::from_config(config)?;
    let directory = StockDirectory::from_config(config)?;
    let mut lines = io::stdin().lock().lines();

    loop {
        let Some(keyword) = prompt(&mut lines, "\nCompany name keyword (q to quit): ")? else {
            break;
        };
        if keyword.eq_ignore_ascii_case("q") {
            break;
        }
        if keyword.is_empty() {
            continue;
        }

        let hits = directory.search(&keyword);
        if hits.is_empty() {
            info!(keyword, "no matching stocks");
            continue;
        }
        println!("\nResults:");
        print_listings(&hits);

        let Some(pick) = choose(&mut lines, "\nStock number (q to search again): ", hits.len())?
        else {
            continue;
        };
        let stock = &hits[pick];

        println!("\nFrequencies:");
        for (i, g) in Granularity::ALL.iter().enumerate() {
            println!("{}. {} ({})", i + 1, g, g.label());
        }
        let Some(freq) = choose(&mut lines, "\nFrequency number (q to search again): ", Granularity::ALL.len())?
        else {
            continue;
        };
        let granularity = Granularity::ALL[freq];

        println!("\nFetching {} {} data...", stock.name, granularity);
        match manager.get_and_save(&stock.code, granularity, INTERACTIVE_COUNT, None) {
            Ok(saved) => {
                print_table(&saved.table)?;
                info!(path = %saved.archive_path.display(), "data saved");
            }
            Err(e) => error!(error = %e, "fetch failed"),
        }
    }

    Ok(())
}

/// Print `text` and read one trimmed line. `None` on end of input.
fn prompt(lines: &mut impl Iterator<Item = io::Result<String>>, text: &str) -> Result<Option<String>> {
    print!("{text}");
    io::stdout().flush()?;
    match lines.next() {
        Some(line) => Ok(Some(line?.trim().to_string())),
        None => Ok(None),
    }
}

/// Ask for a 1-based choice until it is valid. Returns a 0-based index, or
/// `None` on `q` or end of input.
fn choose(
    lines: &mut impl Iterator<Item = io::Result<String>>,
    text: &str,
    len: usize,
) -> Result<Option<usize>> {
    loop {
        let Some(answer) = prompt(lines, text)? else {
            return Ok(None);
        };
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=len).contains(&n) => return Ok(Some(n - 1)),
            Ok(_) => println!("Enter a number between 1 and {len}"),
            Err(_) => println!("Enter a valid number"),
        }
    }
}

fn print_listings(listings: &[StockListing]) {
    for (i, stock) in listings.iter().enumerate() {
        println!("{}. {}  {}", i + 1, stock.code, stock.name);
    }
}

fn print_table(table: &QuoteTable) -> Result<()> {
    let df = table.to_dataframe()?;
    println!("{df}");
    Ok(())
}
