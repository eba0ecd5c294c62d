use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::BuildConfig;
use crate::dashboard::{CategoryEntry, Dashboard, RankingsRequest, CHART_TOP_K, TABLE_LIMIT};
use crate::pages::{default_request, file_path, seo_data, url_path, PageContext};
use crate::render::render_page;
use crate::store::{DocumentStore, StoreError};

type PageError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
pub struct BuildStats {
  pub pages_generated: usize,
  pub errors: usize,
  pub cache_hits: usize,
}

pub struct SiteBuilder {
  dashboard: Dashboard,
  config: BuildConfig,
  today: NaiveDate,
}

impl SiteBuilder {
  pub fn new(store: Arc<dyn DocumentStore>, config: BuildConfig, today: NaiveDate) -> SiteBuilder {
    SiteBuilder {
      dashboard: Dashboard::new(store),
      config,
      today,
    }
  }

  // Builds the whole matrix in fixed-size concurrent batches. A failed page
  // is counted and logged; its siblings keep going. Only the startup probe is
  // fatal: if the store is unreachable before any page is attempted, the
  // build stops with no partial output.
  pub async fn build_all(&self) -> Result<BuildStats, StoreError> {
    let default_req = default_request();
    self.dashboard.fetch_rankings(&default_req, Some(1)).await?;

    let mut combos = self.config.combinations();
    if !combos.iter().any(|c| url_path(c) == "/") {
      combos.push(default_req);
    }
    info!("building {} pages", combos.len());

    // The category list is shared navigation furniture; one degraded fetch
    // must not fail every page.
    let categories = match self.dashboard.fetch_categories().await {
      Ok(categories) => categories,
      Err(e) => {
        warn!("category listing failed, navigation will be empty: {}", e);
        Vec::new()
      }
    };

    let mut stats = BuildStats::default();
    for batch in combos.chunks(self.config.concurrent_builds) {
      let results = futures::future::join_all(
        batch.iter().map(|req| self.build_page(req, categories.clone())),
      )
      .await;

      for (req, result) in batch.iter().zip(results) {
        match result {
          Ok(path) => {
            stats.pages_generated += 1;
            info!("generated {}", path.display());
          }
          Err(e) => {
            stats.errors += 1;
            warn!(
              "page build failed for {}/{}/{}d: {}",
              req.category,
              req.platform.as_str(),
              req.window.as_str(),
              e
            );
          }
        }
      }
    }

    stats.cache_hits = self.dashboard.cache_hits();
    Ok(stats)
  }

  async fn build_page(
    &self,
    req: &RankingsRequest,
    categories: Vec<CategoryEntry>,
  ) -> Result<PathBuf, PageError> {
    let rankings = self.dashboard.fetch_rankings(req, Some(TABLE_LIMIT)).await?;
    let trending = self.dashboard.fetch_trending().await;

    let top = &rankings[..rankings.len().min(CHART_TOP_K)];
    let trend = self.dashboard.fetch_trend_dataset(req, top, self.today).await;

    let seo = seo_data(req, &rankings);
    let ctx = PageContext {
      request: req.clone(),
      rankings,
      trending,
      trend,
      categories,
      seo,
      generated_on: self.today.format("%Y-%m-%d").to_string(),
    };

    let html = render_page(&ctx);
    let path = file_path(std::path::Path::new(&self.config.output_dir), req);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, html).await?;
    Ok(path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use serde_json::json;

  fn aggregate() -> serde_json::Value {
    json!({ "keywords": [
      { "keyword": "widget", "combined_score": 90, "reddit_post_count": 40, "youtube_video_count": 9 },
      { "keyword": "gadget", "combined_score": 30, "reddit_post_count": 10, "youtube_video_count": 2 }
    ]})
  }

  fn seeded_store() -> MemoryStore {
    let mut store = MemoryStore::new();
    for window in ["7", "30", "90"] {
      store = store.with_doc(
        &format!("all_categories/all_categories/time_windows/{window}_days"),
        aggregate(),
      );
      store = store.with_doc(
        &format!("all_categories/devices/time_windows/{window}_days"),
        aggregate(),
      );
    }
    store
  }

  fn small_config(output_dir: &str) -> BuildConfig {
    BuildConfig {
      output_dir: output_dir.to_string(),
      categories: vec!["all_categories".to_string(), "devices".to_string()],
      platforms: vec!["all".to_string(), "reddit".to_string()],
      time_windows: vec!["30".to_string(), "7".to_string()],
      ..BuildConfig::default()
    }
  }

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
  }

  #[tokio::test]
  async fn builds_every_combination_with_root_default() {
    let dir = tempfile::tempdir().unwrap();
    let builder = SiteBuilder::new(
      Arc::new(seeded_store()),
      small_config(dir.path().to_str().unwrap()),
      today(),
    );

    let stats = builder.build_all().await.unwrap();
    assert_eq!(stats.pages_generated, 8);
    assert_eq!(stats.errors, 0);

    assert!(dir.path().join("index.html").exists());
    assert!(dir.path().join("reddit/index.html").exists());
    assert!(dir.path().join("7d/index.html").exists());
    assert!(dir.path().join("category/devices/reddit/7d/index.html").exists());

    let root = std::fs::read_to_string(dir.path().join("index.html")).unwrap();
    assert!(root.contains("widget"));
  }

  #[tokio::test]
  async fn member_failure_is_counted_and_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let store = seeded_store().failing_for("devices");
    let builder = SiteBuilder::new(
      Arc::new(store),
      small_config(dir.path().to_str().unwrap()),
      today(),
    );

    let stats = builder.build_all().await.unwrap();
    // The four devices pages fail; the four all_categories pages survive.
    assert_eq!(stats.errors, 4);
    assert_eq!(stats.pages_generated, 4);
    assert!(dir.path().join("index.html").exists());
    assert!(!dir.path().join("category/devices/index.html").exists());
  }

  #[tokio::test]
  async fn unreachable_store_is_fatal_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let builder = SiteBuilder::new(
      Arc::new(MemoryStore::failing()),
      small_config(dir.path().to_str().unwrap()),
      today(),
    );

    assert!(builder.build_all().await.is_err());
    assert!(!dir.path().join("index.html").exists());
  }

  #[tokio::test]
  async fn combination_without_data_still_renders_a_page() {
    let dir = tempfile::tempdir().unwrap();
    // Only the sentinel docs exist; "devices" has no data anywhere but the
    // store itself is reachable.
    let mut store = MemoryStore::new();
    for window in ["7", "30", "90"] {
      store = store.with_doc(
        &format!("all_categories/all_categories/time_windows/{window}_days"),
        aggregate(),
      );
    }
    let builder = SiteBuilder::new(
      Arc::new(store),
      small_config(dir.path().to_str().unwrap()),
      today(),
    );

    let stats = builder.build_all().await.unwrap();
    assert_eq!(stats.errors, 0);
    assert_eq!(stats.pages_generated, 8);

    let devices = std::fs::read_to_string(dir.path().join("category/devices/index.html")).unwrap();
    assert!(devices.contains("No data available"));
  }

  #[tokio::test]
  async fn repeated_windows_reuse_the_fetch_cache() {
    let dir = tempfile::tempdir().unwrap();
    let config = BuildConfig {
      output_dir: dir.path().to_str().unwrap().to_string(),
      categories: vec!["all_categories".to_string()],
      platforms: vec!["all".to_string(), "reddit".to_string(), "youtube".to_string()],
      time_windows: vec!["30".to_string()],
      ..BuildConfig::default()
    };
    let builder = SiteBuilder::new(Arc::new(seeded_store()), config, today());

    let stats = builder.build_all().await.unwrap();
    assert_eq!(stats.pages_generated, 3);
    // Three platform views of one combination share a single document fetch
    // (plus the startup probe).
    assert!(stats.cache_hits >= 2);
  }

  #[test]
  fn ranked_slice_for_chart_is_capped_at_top_k() {
    let rankings: Vec<usize> = (0..10).collect();
    assert_eq!(rankings[..rankings.len().min(CHART_TOP_K)].len(), 3);
    let short: Vec<usize> = vec![1];
    assert_eq!(short[..short.len().min(CHART_TOP_K)].len(), 1);
  }
}
