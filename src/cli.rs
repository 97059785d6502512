use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::charts;
use crate::config::{self, AppConfig, Credentials};
use crate::sheet::{Sheet, Workbook};
use crate::snapshot::{self, STATUS_COLUMNS, STATUS_PREFIX};
use crate::tracker::IssueTracker;
use crate::util::dates::{parse_date_label, utc_today};
use crate::wiki::confluence::ConfluenceClient;
use crate::wiki::AttachmentService;

#[derive(Debug, Parser)]
#[command(
    name = "statusbook",
    version,
    about = "Record issue-tracker ticket statuses over time in a workbook"
)]
pub struct Cli {
    /// Config file (default: ~/.statusbook/config.toml)
    #[arg(long, global = true, env = "STATUSBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Workbook file, overriding the configured one
    #[arg(long, global = true)]
    pub workbook: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Append today's status column to every status sheet
    Snapshot {
        /// Capture date (yyyy-MM-dd); defaults to today in UTC
        #[arg(long, value_parser = parse_date_label)]
        today: Option<NaiveDate>,
    },
    /// Rebuild every date column of every status sheet from ticket histories
    Backfill,
    /// Show or change the tracker query of a status sheet
    #[command(subcommand)]
    Query(QueryCommand),
    #[command(subcommand)]
    Sheet(SheetCommand),
    #[command(subcommand)]
    Chart(ChartCommand),
    /// Store service credentials after checking them
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    Show { sheet: String },
    Set { sheet: String, jql: String },
}

#[derive(Debug, Subcommand)]
pub enum SheetCommand {
    /// Create a sheet; status sheets are named "Status: <team>"
    Create {
        name: String,
        /// Header columns, comma separated
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
    List,
    /// Print a sheet as tab-separated rows
    Show { name: String },
}

#[derive(Debug, Subcommand)]
pub enum ChartCommand {
    /// Register an exported chart image on a sheet
    Add { sheet: String, image: PathBuf },
    /// Add a record to the "Data: Charts" sheet
    Register {
        sheet: String,
        index: usize,
        page_id: u64,
        #[arg(long)]
        file_type: Option<String>,
    },
    /// Upload every registered chart to its wiki page
    Publish,
    /// Copy every registered chart into a directory
    Export { dir: PathBuf },
    /// Add today's column to every charted sheet
    Extend {
        #[arg(long, value_parser = parse_date_label)]
        today: Option<NaiveDate>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    Tracker {
        url: String,
        user: String,
        #[arg(long, env = "STATUSBOOK_TRACKER_SECRET", hide_env_values = true)]
        secret: String,
    },
    Wiki {
        url: String,
        user: String,
        #[arg(long, env = "STATUSBOOK_WIKI_SECRET", hide_env_values = true)]
        secret: String,
    },
    Show,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = self.config.clone().unwrap_or_else(config::default_config_path);
        let config = config::load_config(&config_path)?;
        let workbook_path = self
            .workbook
            .clone()
            .unwrap_or_else(|| config.workbook_path());

        match self.command {
            Command::Snapshot { today } => {
                let tracker = config.tracker_client()?;
                let mut book = Workbook::open(&workbook_path)?;
                let today = today.unwrap_or_else(utc_today);
                for report in snapshot::append_current_snapshot(&tracker, &mut book, today).await? {
                    let source = match report.fetched {
                        Some(n) => format!("fetched {n}"),
                        None => "reused staging".to_string(),
                    };
                    println!(
                        "{}: column {}, {source}, {} new rows",
                        report.sheet, report.column, report.appended
                    );
                }
            }
            Command::Backfill => {
                let tracker = config.tracker_client()?;
                let mut book = Workbook::open(&workbook_path)?;
                for report in snapshot::backfill_history(&tracker, &mut book).await? {
                    println!(
                        "{}: {} rows x {} dates",
                        report.sheet, report.rows, report.columns
                    );
                }
            }
            Command::Query(cmd) => handle_query(cmd, &workbook_path)?,
            Command::Sheet(cmd) => handle_sheet(cmd, &workbook_path)?,
            Command::Chart(cmd) => handle_chart(cmd, &workbook_path, &config).await?,
            Command::Config(cmd) => handle_config(cmd, &config_path, config).await?,
        }
        Ok(())
    }
}

fn handle_query(cmd: QueryCommand, workbook_path: &Path) -> Result<()> {
    let mut book = Workbook::open(workbook_path)?;
    match cmd {
        QueryCommand::Show { sheet } => {
            book.require_sheet(&sheet)?;
            println!("{}", book.query(&sheet));
        }
        QueryCommand::Set { sheet, jql } => {
            book.save_query(&sheet, &jql)?;
            book.save()?;
        }
    }
    Ok(())
}

fn handle_sheet(cmd: SheetCommand, workbook_path: &Path) -> Result<()> {
    let mut book = Workbook::open(workbook_path)?;
    match cmd {
        SheetCommand::Create { name, columns } => {
            let sheet = if columns.is_empty() {
                Sheet::with_header(name.as_str(), &STATUS_COLUMNS)
            } else {
                Sheet::with_header(name.as_str(), &columns)
            };
            if !book.insert_sheet(sheet) {
                bail!("Sheet {name} already exists");
            }
            book.save()?;
            println!("Created {name} in {}", book.path().display());
            if name.starts_with(STATUS_PREFIX) {
                println!("Set its tracker query with `statusbook query set`");
            }
        }
        SheetCommand::List => {
            for sheet in book.sheets() {
                let hidden = if sheet.hidden { " (hidden)" } else { "" };
                println!("{}{hidden}", sheet.name);
            }
        }
        SheetCommand::Show { name } => {
            for row in book.require_sheet(&name)?.display_rows() {
                println!("{}", row.join("\t"));
            }
        }
    }
    Ok(())
}

async fn handle_chart(cmd: ChartCommand, workbook_path: &Path, config: &AppConfig) -> Result<()> {
    let mut book = Workbook::open(workbook_path)?;
    match cmd {
        ChartCommand::Add { sheet, image } => {
            let image = image
                .canonicalize()
                .with_context(|| format!("Chart image {} not found", image.display()))?;
            let index = charts::add_chart_image(&mut book, &sheet, &image)?;
            book.save()?;
            println!("{sheet}: chart {index}");
        }
        ChartCommand::Register {
            sheet,
            index,
            page_id,
            file_type,
        } => {
            let row = charts::register_chart(&mut book, &sheet, index, page_id, file_type.as_deref())?;
            book.save()?;
            println!("{}: row {row}", charts::CHARTS_SHEET);
        }
        ChartCommand::Publish => {
            let wiki: ConfluenceClient = config.wiki_client()?;
            for outcome in charts::publish_to_wiki(&wiki, &mut book).await? {
                match outcome {
                    charts::PublishOutcome::Created { sheet, attachment_id } => println!(
                        "{sheet}: attached {}",
                        attachment_id.as_deref().unwrap_or("(no id returned)")
                    ),
                    charts::PublishOutcome::Updated { sheet, attachment_id } => {
                        println!("{sheet}: updated {attachment_id}")
                    }
                }
            }
            book.save()?;
        }
        ChartCommand::Export { dir } => {
            for path in charts::export_charts(&book, &dir)? {
                println!("{}", path.display());
            }
        }
        ChartCommand::Extend { today } => {
            let today = today.unwrap_or_else(utc_today);
            for sheet in charts::extend_chart_sheets(&mut book, today)? {
                println!("{sheet}: added {today}");
            }
            book.save()?;
        }
    }
    Ok(())
}

async fn handle_config(cmd: ConfigCommand, config_path: &Path, config: AppConfig) -> Result<()> {
    match cmd {
        ConfigCommand::Tracker { url, user, secret } => {
            let creds = Credentials::new(&url, &user, &secret);
            let tracker = config::jira_client(&creds, &config);
            save_tracker_credentials(&tracker, creds, config_path, config).await?;
            println!("Tracker credentials saved to {}", config_path.display());
        }
        ConfigCommand::Wiki { url, user, secret } => {
            let creds = Credentials::new(&url, &user, &secret);
            let wiki = ConfluenceClient::new(&creds.url, &creds.user, &creds.secret);
            save_wiki_credentials(&wiki, creds, config_path, config).await?;
            println!("Wiki credentials saved to {}", config_path.display());
        }
        ConfigCommand::Show => {
            let mask = |v: &Option<String>| if v.is_some() { "********" } else { "(unset)" };
            let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "(unset)".to_string());
            println!("trackerUrl    = {}", show(&config.tracker_url));
            println!("trackerUser   = {}", show(&config.tracker_user));
            println!("trackerSecret = {}", mask(&config.tracker_secret));
            println!("wikiUrl       = {}", show(&config.wiki_url));
            println!("wikiUser      = {}", show(&config.wiki_user));
            println!("wikiSecret    = {}", mask(&config.wiki_secret));
            println!("workbook      = {}", config.workbook_path().display());
        }
    }
    Ok(())
}

/// Persist tracker credentials once `tracker` accepts them. Nothing is
/// written when the check fails.
async fn save_tracker_credentials<T: IssueTracker + ?Sized>(
    tracker: &T,
    creds: Credentials,
    config_path: &Path,
    mut config: AppConfig,
) -> Result<()> {
    tracker
        .verify()
        .await
        .with_context(|| format!("{} rejected the credentials", tracker.name()))?;
    config.set_tracker(creds);
    config::save_config(config_path, &config)
}

async fn save_wiki_credentials<W: AttachmentService + ?Sized>(
    wiki: &W,
    creds: Credentials,
    config_path: &Path,
    mut config: AppConfig,
) -> Result<()> {
    wiki.verify().await.context("Wiki rejected the credentials")?;
    config.set_wiki(creds);
    config::save_config(config_path, &config)
}
