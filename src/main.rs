use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use cafe_visits_lib::config::{Args, Config, LogFormat};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args);

    let config = match Config::from_args(&args) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return Err(Box::new(e));
        }
    };
    if args.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }
    info!(
        bind_addr = %config.bind_addr,
        storage = ?config.storage,
        cafes = config.cafe_count,
        interval_ms = config.interval.as_millis() as u64,
        "starting cafe-visits"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move { cafe_visits_lib::run(config).await })?;
    return Ok(());
}

fn init_logging(args: &Args) {
    let filter = EnvFilter::try_new(format!("cafe_visits_lib={level},cafe_visits={level}", level = args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match args.log_format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        },
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
