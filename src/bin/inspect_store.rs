// Ad-hoc store inspector: fetches one (category, platform, window)
// combination and reports what the raw document looks like next to what the
// normalizer makes of it. Useful when upstream schema drift is suspected.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use toolpulse::dashboard::{Dashboard, RankingsRequest, CHART_TOP_K, TABLE_LIMIT};
use toolpulse::firestore::{FirestoreClient, FirestoreConfig};
use toolpulse::rankings::{shape_name, Platform, TimeWindow};

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
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
    )
    .with_target(false)
    .init();

  let args: Vec<String> = std::env::args().collect();

  let category = parse_flag_value(&args, "--category").unwrap_or_else(|| "all".to_string());
  let platform_arg = parse_flag_value(&args, "--platform").unwrap_or_else(|| "all".to_string());
  let window_arg = parse_flag_value(&args, "--window").unwrap_or_else(|| "30".to_string());

  let Some(platform) = Platform::parse(&platform_arg) else {
    eprintln!("Unknown platform {platform_arg:?} (expected all|reddit|youtube); no data to show.");
    return Ok(());
  };
  let Some(window) = TimeWindow::parse(&window_arg) else {
    eprintln!("Unknown time window {window_arg:?} (expected 7|30|90); no data to show.");
    return Ok(());
  };

  let config = match parse_flag_value(&args, "--project-id") {
    Some(project_id) => FirestoreConfig {
      project_id,
      access_token: std::env::var("FIRESTORE_ACCESS_TOKEN")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()),
    },
    None => FirestoreConfig::from_env()
      .map_err(|e| anyhow::anyhow!("{e}. Set FIRESTORE_PROJECT_ID or pass --project-id."))?,
  };

  let dashboard = Dashboard::new(Arc::new(FirestoreClient::new(config)));
  let req = RankingsRequest::new(&category, platform, window);

  let raw = dashboard.rankings_doc(&req).await?;
  match raw.as_ref() {
    None => {
      println!(
        "combination={}/{}/{}d found=false",
        req.category,
        platform.as_str(),
        window.as_str()
      );
      return Ok(());
    }
    Some(doc) => {
      let shape = shape_name(doc).unwrap_or("unrecognized");
      let entries = doc
        .get("keywords")
        .map(|k| {
          k.as_array()
            .map(|a| a.len())
            .or_else(|| k.as_object().map(|o| o.len()))
            .unwrap_or(0)
        })
        .or_else(|| doc.get("all").and_then(|v| v.as_object()).map(|o| o.len()))
        .or_else(|| doc.get("products").and_then(|v| v.as_array()).map(|a| a.len()))
        .unwrap_or(0);
      println!(
        "combination={}/{}/{}d found=true shape={} raw_entries={}",
        req.category,
        platform.as_str(),
        window.as_str(),
        shape,
        entries
      );
    }
  }

  let rankings = dashboard.fetch_rankings(&req, Some(TABLE_LIMIT)).await?;
  println!("normalized_entries={}", rankings.len());
  for item in &rankings {
    println!(
      "rank={} name={:?} category={:?} score={} velocity={} momentum={}",
      item.rank, item.name, item.category, item.score, item.velocity, item.momentum
    );
  }

  if has_flag(&args, "--trend") {
    let top = &rankings[..rankings.len().min(CHART_TOP_K)];
    let today = Utc::now().date_naive();
    let trend = dashboard.fetch_trend_dataset(&req, top, today).await;
    println!("trend_buckets={} labels={:?}", trend.labels.len(), trend.labels);
    for series in &trend.series {
      println!("series={:?} points={:?}", series.label, series.points);
    }
  }

  if has_flag(&args, "--trending") {
    let trending = dashboard.fetch_trending().await;
    println!("trending_entries={}", trending.len());
    for item in &trending {
      println!("rank={} name={:?} score={}", item.rank, item.name, item.score);
    }
  }

  if has_flag(&args, "--categories") {
    let categories = dashboard.fetch_categories().await?;
    println!("categories={}", categories.len());
    for category in &categories {
      println!("id={} name={:?}", category.id, category.name);
    }
  }

  Ok(())
}
