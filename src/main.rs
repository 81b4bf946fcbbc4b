mod config;
mod enrich;
mod errors;
mod loader;
mod models;
mod pipeline;
mod schema;
mod scraper;
mod storage;
mod summary;
mod tasks;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::errors::CollectError;
use crate::models::RecordSet;
use crate::pipeline::Collector;
use crate::scraper::HttpClient;
use crate::storage::OutputDir;
use crate::tasks::{headlines, listings, psx, universities};

#[derive(Parser)]
#[command(name = "table-harvest", about = "Scrape HTML tables and link lists into clean CSV/JSON", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output directory (overrides output.dir)
    #[arg(long, global = true, env = "SCRAPE_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Target record count for the task (overrides collect.*)
    #[arg(long, global = true)]
    limit: Option<usize>,

    /// Skip the JSON copy of each table
    #[arg(long, global = true)]
    no_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Latest news headlines from dawn.com
    Headlines,

    /// PSX indices (LDCP derived from Current - Change)
    Indices,

    /// PSX main board scrips from the market summary
    Mainboard,

    /// Indices and main board in one run
    Psx,

    /// QS top universities with country and region
    Universities,

    /// Daraz search-result product cards
    Listings {
        /// Search phrase (overrides collect.listings_query)
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Group a saved CSV by one column and average another
    Summarize {
        /// CSV written by a previous run
        input: PathBuf,

        #[arg(short, long)]
        group: String,

        #[arg(short = 'c', long)]
        value: String,

        /// Defaults to <input stem>_by_<group>.csv in the output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

struct App {
    config: AppConfig,
    collector: Collector,
    out: OutputDir,
    limit: Option<usize>,
}

impl App {
    fn new(config: AppConfig, limit: Option<usize>) -> Result<Self> {
        let client = HttpClient::new(&config.fetch)?;
        let out = OutputDir::new(&config.output.dir);
        Ok(Self {
            collector: Collector::new(Arc::new(client)),
            out,
            limit,
            config,
        })
    }

    fn target(&self, default: usize) -> usize {
        self.limit.unwrap_or(default)
    }

    fn save(&self, name: &str, set: &RecordSet) -> Result<()> {
        self.out
            .save(name, set, self.config.output.write_json)
            .with_context(|| format!("Saving {name}"))?;
        println!("\n[{}] {} rows", name, set.len());
        println!("{}", utils::preview(set, 10));
        Ok(())
    }

    async fn headlines(&self) -> Result<()> {
        let _t = utils::Timer::start("headlines");
        let plan = headlines::plan(self.target(self.config.collect.headlines))?;
        let set = fatal(plan.name, plan.collect(&self.collector).await)?;
        self.save(plan.name, &set)
    }

    async fn indices(&self) -> Result<()> {
        let _t = utils::Timer::start("indices");
        let plan = psx::indices_plan(self.target(self.config.collect.indices))?;
        let set = fatal(plan.name, plan.collect(&self.collector).await)?;
        self.save(plan.name, &set)
    }

    async fn mainboard(&self) -> Result<()> {
        let _t = utils::Timer::start("mainboard");
        let plan = psx::mainboard_plan(self.target(self.config.collect.mainboard))?;
        let set = fatal(plan.name, psx::collect_mainboard(&plan, &self.collector).await)?;
        self.save(plan.name, &set)
    }

    async fn universities(&self) -> Result<()> {
        let _t = utils::Timer::start("universities");
        let plan = universities::plan(self.target(self.config.collect.universities))?;
        let profiles = HttpClient::new(&self.config.enrich.fetch)?;
        let set = fatal(
            plan.name,
            universities::collect(&plan, &self.collector, Arc::new(profiles), &self.config.enrich).await,
        )?;
        self.save(plan.name, &set)?;

        for (name, summary) in universities::summaries(&set) {
            self.save(name, &summary)?;
        }
        Ok(())
    }

    async fn listings(&self, query: Option<&str>) -> Result<()> {
        let _t = utils::Timer::start("listings");
        let query = query.unwrap_or(&self.config.collect.listings_query);
        info!("Searching for {:?}", query);
        let plan = listings::plan(query, self.target(self.config.collect.listings))?;
        let set = fatal(plan.name, plan.collect(&self.collector).await)?;
        self.save(plan.name, &set)
    }
}

/// Total exhaustion is the only collection failure that ends the run.
fn fatal(task: &str, result: Result<RecordSet, CollectError>) -> Result<RecordSet> {
    result.map_err(|e| {
        error!("{} failed: {}", task, e);
        anyhow::Error::new(e).context(format!("{task}: no records collected"))
    })
}

fn summarize(
    out_dir: &std::path::Path,
    input: &std::path::Path,
    group: &str,
    value: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let set = loader::read_csv(input)?;
    for column in [group, value] {
        if !set.columns().iter().any(|c| c == column) {
            anyhow::bail!("{:?} has no column '{}'", input, column);
        }
    }
    let summary = summary::group_summary(&set, group, value);

    let out = out.unwrap_or_else(|| {
        let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("summary");
        let slug: String = group
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        out_dir.join(format!("{stem}_by_{slug}.csv"))
    });
    storage::write_csv(&summary, &out)?;
    println!("{}", utils::preview(&summary, 20));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "table_harvest=info,warn",
        1 => "table_harvest=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config = AppConfig::load()?;
    if let Some(dir) = cli.out_dir {
        config.output.dir = dir;
    }
    if cli.no_json {
        config.output.write_json = false;
    }
    info!("Writing to {:?}", config.output.dir);

    if let Command::Summarize { input, group, value, out } = cli.command {
        return summarize(&config.output.dir, &input, &group, &value, out);
    }

    let app = App::new(config, cli.limit)?;
    match cli.command {
        Command::Headlines => app.headlines().await?,
        Command::Indices => app.indices().await?,
        Command::Mainboard => app.mainboard().await?,
        Command::Psx => {
            app.indices().await?;
            app.mainboard().await?;
        }
        Command::Universities => app.universities().await?,
        Command::Listings { query } => app.listings(query.as_deref()).await?,
        Command::Summarize { .. } => {}
    }

    Ok(())
}
