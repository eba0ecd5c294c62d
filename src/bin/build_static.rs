use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use toolpulse::builder::SiteBuilder;
use toolpulse::config::BuildConfig;
use toolpulse::firestore::{FirestoreClient, FirestoreConfig};

fn parse_flag_value(args: &[String], flag: &str) -> Option<String> {
  args
    .iter()
    .position(|a| a == flag)
    .and_then(|idx| args.get(idx + 1))
    .cloned()
}

fn has_flag(args: &[String], flag: &str) -> bool {
  args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_target(false)
    .init();

  let args: Vec<String> = std::env::args().collect();

  let mut config = BuildConfig::load(parse_flag_value(&args, "--config").as_deref())?;
  if let Some(dir) = parse_flag_value(&args, "--output-dir") {
    config.output_dir = dir;
  }
  if has_flag(&args, "--test-mode") {
    config.test_mode = true;
  }

  let store_config = match parse_flag_value(&args, "--project-id") {
    Some(project_id) => FirestoreConfig {
      project_id,
      access_token: std::env::var("FIRESTORE_ACCESS_TOKEN")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()),
    },
    None => FirestoreConfig::from_env().map_err(|e| {
      anyhow::anyhow!("{e}. Set FIRESTORE_PROJECT_ID or pass --project-id.")
    })?,
  };
  let store = Arc::new(FirestoreClient::new(store_config));

  let total_pages = config.combinations().len();
  info!(
    "starting static build: mode={} pages={} output_dir={}",
    if config.test_mode { "test" } else { "production" },
    total_pages,
    config.output_dir
  );

  let started = Instant::now();
  let today = Utc::now().date_naive();
  let builder = SiteBuilder::new(store, config, today);

  let stats = builder.build_all().await?;
  let duration = started.elapsed().as_secs_f64();

  println!(
    "pages_generated={} errors={} cache_hits={} duration_secs={:.2} pages_per_sec={:.2}",
    stats.pages_generated,
    stats.errors,
    stats.cache_hits,
    duration,
    stats.pages_generated as f64 / duration.max(0.001)
  );

  if stats.pages_generated == 0 {
    anyhow::bail!("build failed: no pages generated");
  }
  Ok(())
}
