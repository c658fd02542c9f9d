use certfinder::cli::Args;
use certfinder::config::{load_config, validate_config};
use certfinder::ctlog::{BarReporter, CtClient, Ingestor, LogCatalog, LogReporter, ProgressReporter, Selection};
use certfinder::engine::CertFinderEngine;
use certfinder::output::write_catalog;
use certfinder::session::Session;
use certfinder::sources::{create_source, source_names};
use certfinder::store::NameStore;
use certfinder::types::{CertFinderError, Config, OutputFormat};
use certfinder::updater;
use clap::Parser;
use log::{info, warn};
use std::io;
use std::process;

const BANNER: &str = r#"
               _    __ _           _
  ___ ___ _ __| |_ / _(_)_ __   __| | ___ _ __
 / __/ _ \ '__| __| |_| | '_ \ / _` |/ _ \ '__|
| (_|  __/ |  | |_|  _| | | | | (_| |  __/ |
 \___\___|_|   \__|_| |_|_| |_|\__,_|\___|_|

   Subdomains from Certificate Transparency
"#;

/// Progress lines per log when no bar is drawn
const LOG_PROGRESS_EVERY: u64 = 10_000;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    if !args.silent {
        eprintln!("{}", BANNER);
    }

    if let Err(e) = run(args).await {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    args.validate()?;

    let mut config = load_config(args.config_path.as_deref())?;
    apply_args(&mut config, &args);
    validate_config(&config)?;

    if args.version_check {
        updater::check_version(&config).await?;
        return Ok(());
    }

    if args.pull {
        pull_logs(&config, &args).await?;
        return Ok(());
    }

    harvest(config, &args).await?;
    Ok(())
}

fn apply_args(config: &mut Config, args: &Args) {
    config.resolver.enabled = args.resolve;
    config.output.silent = args.silent;
    if args.csv {
        config.output.format = OutputFormat::Csv;
    }
    if let Some(path) = &args.output_file {
        config.output.file = Some(path.clone());
    }
    if let Some(path) = &args.db {
        config.database_path = path.clone();
    }
    if let Some(concurrency) = args.concurrency {
        config.resolver.concurrency = concurrency;
    }
    if let Some(workers) = args.workers {
        config.ingest.workers = workers;
    }
}

async fn harvest(config: Config, args: &Args) -> Result<(), CertFinderError> {
    let domain = args
        .domain
        .as_deref()
        .ok_or_else(|| CertFinderError::MissingArgument("-d <domain> is required".to_string()))?;
    let source_name = args
        .source
        .as_deref()
        .ok_or_else(|| CertFinderError::MissingArgument("-s <crt|db> is required".to_string()))?;

    let source = create_source(source_name, &config).ok_or_else(|| {
        CertFinderError::ConfigError(format!(
            "unknown source '{}', expected one of: {}",
            source_name,
            source_names().join(", ")
        ))
    })?;

    let mut engine = CertFinderEngine::new(config, source)?;
    let stats = engine.run(domain).await?;

    if stats.records_fetched == 0 {
        warn!("No certificates matched {}", stats.pattern);
    }
    info!(
        "Harvest completed: {} subdomains ({} resolved) from {} records in {:.2}s",
        stats.unique_subdomains,
        stats.resolved_count,
        stats.records_fetched,
        stats.duration.as_secs_f64()
    );

    Ok(())
}

async fn pull_logs(config: &Config, args: &Args) -> Result<(), CertFinderError> {
    let session = Session::new(config)?;
    let client = CtClient::new(session.clone());

    let catalog = LogCatalog::fetch(&session, &client, &config.log_list_url, config.ingest.probe_timeout).await?;
    write_catalog(&mut io::stdout(), catalog.logs())?;

    let default_log = catalog.default_log(config.default_log_url.as_deref());
    match &default_log {
        Some(url) => info!("Default log: {}", url),
        None => warn!("No log is accepting entries, pick one from the list"),
    }

    let store = NameStore::open(&config.database_path).await?;
    let ingestor = Ingestor::new(client, store.clone(), config.ingest.clone());

    let reporter: Box<dyn ProgressReporter> = if !args.silent && atty::is(atty::Stream::Stderr) {
        Box::new(BarReporter::new())
    } else {
        Box::new(LogReporter::new(LOG_PROGRESS_EVERY))
    };

    match &args.log {
        Some(answer) => {
            let selection = catalog.parse_selection(answer)?;
            pull_selection(&catalog, &ingestor, &selection, default_log.as_deref(), reporter.as_ref()).await;
        }
        None => loop {
            // stdin is locked per answer, never across a pull
            let selection = tokio::task::block_in_place(|| {
                let mut input = io::stdin().lock();
                catalog.prompt_selection(&mut input, &mut io::stdout(), default_log.as_deref())
            })?;
            if selection == Selection::Quit {
                break;
            }
            pull_selection(&catalog, &ingestor, &selection, default_log.as_deref(), reporter.as_ref()).await;
        },
    }

    info!("{} names in {}", store.count().await?, store.path().display());
    store.close().await;
    Ok(())
}

async fn pull_selection(
    catalog: &LogCatalog,
    ingestor: &Ingestor,
    selection: &Selection,
    default_log: Option<&str>,
    reporter: &dyn ProgressReporter,
) {
    let urls = catalog.urls_for(selection, default_log);
    if urls.is_empty() {
        warn!("Nothing to download for {:?}", selection);
        return;
    }

    let summaries = ingestor.ingest_all(&urls, reporter).await;
    let stored: u64 = summaries.iter().map(|s| s.stored).sum();
    let failed: u64 = summaries.iter().map(|s| s.failed).sum();
    info!(
        "Pulled {} of {} logs: {} names stored, {} entries unparsed",
        summaries.len(),
        urls.len(),
        stored,
        failed
    );
}
