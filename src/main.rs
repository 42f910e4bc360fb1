use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;
use tripdash::error_display::user_message_from_report;
use tripdash::{
    AgentAction, AggregateResult, AppConfig, Args, CacheManager, ConfigManager,
    DeclarativeQuery, LoadOptions, LoadReport, QueryHistory, Session, APP_NAME,
};

fn init_tracing(debug: bool) {
    let level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let manager = ConfigManager::new(APP_NAME)?;
        let path = manager.write_default_config(args.force)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(Some(()));
    }

    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                cache.clear_all()?;
                println!("Cache cleared successfully");
            }
            Err(_e) => println!("No cache to clear"),
        }
        return Ok(Some(()));
    }

    Ok(None)
}

/// Fold command-line overrides into the loaded configuration.
fn apply_args(config: &mut AppConfig, args: &Args) -> Result<()> {
    if let Some(url) = &args.remote_url {
        config.remote.url = Some(url.clone());
    }
    if let Some(key) = &args.remote_key {
        config.remote.api_key = Some(key.clone());
    }
    if let Some(table) = &args.remote_table {
        config.remote.table = table.clone();
    }
    if let Some(max_rows) = args.max_rows {
        config.retention.max_rows = max_rows;
    }
    config.validate()
}

fn load_options(config: &AppConfig, args: &Args) -> LoadOptions {
    let mut opts = LoadOptions::from_config(config);
    if let Some(no_header) = args.no_header {
        opts = opts.with_has_header(!no_header);
    }
    if let Some(delimiter) = args.delimiter {
        opts = opts.with_delimiter(delimiter);
    }
    if let Some(compression) = args.compression {
        opts = opts.with_compression(compression);
    }
    if let Some(dir) = &args.temp_dir {
        opts = opts.with_temp_dir(dir.clone());
    }
    opts
}

fn build_session(config: &AppConfig, args: &Args) -> Session {
    let mut session = Session::new(config).with_load_options(load_options(config, args));

    #[cfg(feature = "http")]
    {
        if let Some(backend) = tripdash::PostgrestBackend::from_config(&config.remote) {
            session = session.with_remote(Box::new(backend));
        }
    }

    if config.query.enable_history {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                session = session.with_history(QueryHistory::load(cache, config.query.history_limit))
            }
            Err(e) => tracing::warn!("Query history disabled: {}", e),
        }
    }
    session
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_summary(report: &LoadReport, result: &AggregateResult) {
    let s = &result.summary;
    println!("{}", report.source);
    println!(
        "  rows: {} parsed, {} kept, {} rejected, {} over the cap",
        report.parsed_rows, report.retained_rows, report.rejected_rows, report.truncated_rows
    );
    println!("  trips:          {}", s.total_trips);
    println!(
        "  members:        {} ({}%), casual: {}",
        s.member_trips, s.member_ratio, s.casual_trips
    );
    println!("  mean duration:  {} min", s.mean_duration_minutes);
    println!("  peak hour:      {}", s.peak_hour.label);
    println!("  busiest day:    {}", s.busiest_day.label);
    if let Some(top) = result.top_routes.first() {
        println!("  top route:      {} ({})", top.name, top.value);
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = AppConfig::load(APP_NAME)?;
    apply_args(&mut config, args)?;

    let path = args
        .path
        .as_deref()
        .ok_or_else(|| eyre!("A trip CSV path or URL is required"))?;

    let mut session = build_session(&config, args);
    if let Err(e) = session.load(path) {
        tracing::debug!("load failed: {:?}", e);
        return Err(eyre!(user_message_from_report(&e, Some(path))));
    }

    if let Some(json) = &args.query {
        let query: DeclarativeQuery =
            serde_json::from_str(json).map_err(|e| eyre!("Invalid query: {}", e))?;
        let outcome = session.select(&config.remote.table, &query);
        return print_json(&outcome);
    }

    if let Some(json) = &args.action {
        let outcome = session.dispatch(AgentAction::parse(json)?);
        return print_json(&outcome);
    }

    let (Some(report), Some(result)) = (session.report(), session.result()) else {
        return Err(eyre!("Nothing was loaded"));
    };
    if args.datasets {
        print_json(result.as_ref())
    } else {
        print_summary(report, &result);
        Ok(())
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    init_tracing(args.debug);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
