use anyhow::Result;
use clap::Parser;
use metric_pulse::ingest::load_all;
use metric_pulse::llm::{LlmClient, DUMMY_API_KEY};
use metric_pulse::{BriefPipeline, PulseConfig, PulseError, ResilientClient, RetryPolicy, ScanOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metric-pulse")]
#[command(about = "Multi-timeframe variance scan with a generated daily brief")]
struct Args {
    /// JSON config file (every field optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the timeframe CSVs
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Brief output path (default: brief_YYYYMMDD.txt)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the flagged anomalies as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    #[arg(long)]
    top_n: Option<usize>,

    #[arg(long)]
    min_volume: Option<f64>,

    /// Anthropic API key (or set ANTHROPIC_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PulseConfig::load(path)?,
        None => PulseConfig::default(),
    };
    if let Some(top_n) = args.top_n {
        config.scan.top_n = top_n;
    }
    if let Some(min_volume) = args.min_volume {
        config.scan.min_volume = min_volume;
    }
    if let Some(model) = args.model {
        config.llm.model = model;
    }
    config.validate()?;

    info!("Metric pulse starting (model {})", config.llm.model);

    let api_key = args
        .api_key
        .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
        .unwrap_or_else(|| {
            warn!("No API key found, running with offline narrative");
            DUMMY_API_KEY.to_string()
        });
    let llm = LlmClient::new(api_key, config.llm.clone())?;
    let client = ResilientClient::new(Arc::new(llm), RetryPolicy::from(&config.retry));

    let inputs = load_all(&args.data_dir, &config);
    let pipeline = BriefPipeline::new(ScanOrchestrator::new(config.scan.clone())?, client);

    let output = match pipeline.run(inputs).await {
        Ok(output) => output,
        Err(PulseError::NoData(detail)) => {
            error!("No data to analyze: {}", detail);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    for warning in &output.summary.warnings {
        warn!("{}", warning);
    }

    let output_path = args.output.unwrap_or_else(|| {
        PathBuf::from(format!("brief_{}.txt", chrono::Local::now().format("%Y%m%d")))
    });
    std::fs::write(&output_path, &output.report)?;
    info!("Report saved to {}", output_path.display());

    if let Some(json_path) = args.json {
        let json = serde_json::to_string_pretty(&output.summary.anomalies())?;
        std::fs::write(&json_path, json)?;
        info!("Anomalies exported to {}", json_path.display());
    }

    println!("{}", output.report);
    Ok(())
}
