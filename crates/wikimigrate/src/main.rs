mod logging;

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use wikimigrate_core::config::{
    ConfigOverrides, DEFAULT_CONFIG_FILENAME, MigrateConfig, load_config_file,
};
use wikimigrate_core::migrate::migrate;

#[derive(Debug, Parser)]
#[command(
    name = "wikimigrate",
    version,
    about = "Import a folder tree of text files into wiki pages, one page per file"
)]
struct Cli {
    #[arg(long, value_name = "PATH", help = "Folder holding one subfolder per category")]
    root: Option<PathBuf>,
    #[arg(long, value_name = "URL", help = "GraphQL endpoint of the wiki")]
    api_url: Option<String>,
    #[arg(long, value_name = "CODE", help = "Locale assigned to every created page")]
    locale: Option<String>,
    #[arg(long, value_name = "N", help = "Categories uploaded in parallel (one request in flight each)")]
    concurrency: Option<usize>,
    #[arg(long, value_name = "MS", help = "Timeout for each page-creation request")]
    timeout_ms: Option<u64>,
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILENAME)]
    config: PathBuf,
    #[arg(long, value_name = "PATH", default_value = logging::DEFAULT_LOG_DIR)]
    log_dir: PathBuf,
    #[arg(long, help = "Exit non-zero when any file was not migrated")]
    fail_on_error: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            root_dir: self.root.clone(),
            api_url: self.api_url.clone(),
            locale: self.locale.clone(),
            timeout_ms: self.timeout_ms,
            concurrency: self.concurrency,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    let log_path = logging::init(&cli.log_dir)?;
    info!("Logging to {}", log_path.display());

    let file = load_config_file(&cli.config)?;
    let config = MigrateConfig::resolve(&cli.overrides(), &file)?;
    info!(
        "Target {} (locale {}, concurrency {}, timeout {} ms)",
        config.api_url, config.locale, config.concurrency, config.timeout_ms
    );

    let report = migrate(&config)?;
    if cli.fail_on_error && report.has_failures() {
        bail!(
            "{} of {} files were not migrated",
            report.failures(),
            report.files
        );
    }
    Ok(())
}
