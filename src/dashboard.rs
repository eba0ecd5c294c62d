use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::warn;

use crate::rankings::{normalize_rankings, normalize_trending, Platform, RankedItem, TimeWindow};
use crate::store::{doc_path, DocumentStore, FetchCache, StoreError};
use crate::text::clean_label;
use crate::timeseries::{assemble_trend_dataset, TrendDataset};

pub const RANKINGS_COLLECTION: &str = "all_categories";
// The sentinel "all" request reads the collection's own roll-up document.
pub const CATEGORY_ALL: &str = "all_categories";

const TRENDING_COLLECTION: &str = "PH-dashboard";
const TRENDING_DOC: &str = "top_this_month";

// Internal roll-up documents that must not appear as selectable categories.
const EXCLUDED_CATEGORY_IDS: [&str; 3] = ["reddit", "all_reddit", "all_categories"];

pub const TRENDING_LIMIT: usize = 5;
pub const TABLE_LIMIT: usize = 20;
pub const CHART_TOP_K: usize = 3;

#[derive(Debug, Clone)]
pub struct RankingsRequest {
  pub category: String,
  pub platform: Platform,
  pub window: TimeWindow,
}

impl RankingsRequest {
  pub fn new(category: &str, platform: Platform, window: TimeWindow) -> RankingsRequest {
    let category = category.trim();
    let category = if category.is_empty() || category.eq_ignore_ascii_case("all") {
      CATEGORY_ALL.to_string()
    } else {
      category.to_string()
    };
    RankingsRequest {
      category,
      platform,
      window,
    }
  }

  pub fn is_all_categories(&self) -> bool {
    self.category == CATEGORY_ALL
  }

  pub fn doc_id(&self) -> &str {
    &self.category
  }

  // Category context handed to the normalizer; the sentinel carries no
  // category information of its own.
  fn source_category(&self) -> &str {
    if self.is_all_categories() {
      ""
    } else {
      &self.category
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
  pub id: String,
  pub name: String,
}

pub struct Dashboard {
  store: Arc<dyn DocumentStore>,
  cache: FetchCache,
}

impl Dashboard {
  pub fn new(store: Arc<dyn DocumentStore>) -> Dashboard {
    Dashboard {
      store,
      cache: FetchCache::new(),
    }
  }

  pub fn cache_hits(&self) -> usize {
    self.cache.hit_count()
  }

  async fn cached_doc(
    &self,
    collection: &str,
    doc_id: &str,
    sub_path: Option<(&str, &str)>,
  ) -> Result<Arc<Option<Value>>, StoreError> {
    let key = doc_path(collection, doc_id, sub_path);
    if let Some(hit) = self.cache.get(&key) {
      return Ok(hit);
    }
    let fetched = self.store.get_aggregate(collection, doc_id, sub_path).await?;
    Ok(self.cache.insert_if_absent(&key, fetched))
  }

  // The raw rankings document for a (category, window) pair: the aggregated
  // time-window roll-up when present, else the newest daily snapshot. Both
  // legacy layouts are live in the store.
  pub async fn rankings_doc(&self, req: &RankingsRequest) -> Result<Arc<Option<Value>>, StoreError> {
    let window_doc = format!("{}_days", req.window.as_str());
    let aggregate = self
      .cached_doc(RANKINGS_COLLECTION, req.doc_id(), Some(("time_windows", &window_doc)))
      .await?;
    if aggregate.is_some() {
      return Ok(aggregate);
    }

    let subcollection = format!("{}_days_daily", req.window.as_str());
    let key = format!("{RANKINGS_COLLECTION}/{}/{subcollection}:recent:1", req.doc_id());
    if let Some(hit) = self.cache.get(&key) {
      return Ok(hit);
    }
    let mut docs = self
      .store
      .query_recent(RANKINGS_COLLECTION, req.doc_id(), &subcollection, "date", true, 1)
      .await?;
    let latest = if docs.is_empty() {
      None
    } else {
      Some(docs.remove(0))
    };
    Ok(self.cache.insert_if_absent(&key, latest))
  }

  pub async fn fetch_rankings(
    &self,
    req: &RankingsRequest,
    limit: Option<usize>,
  ) -> Result<Vec<RankedItem>, StoreError> {
    let doc = self.rankings_doc(req).await?;
    let Some(doc) = doc.as_ref() else {
      warn!(
        "no rankings data for {}/{}/{}d",
        req.category,
        req.platform.as_str(),
        req.window.as_str()
      );
      return Ok(Vec::new());
    };
    Ok(normalize_rankings(doc, req.platform, req.source_category(), limit))
  }

  // Trending is best-effort page furniture; any failure degrades to an empty
  // list rather than failing the page.
  pub async fn fetch_trending(&self) -> Vec<RankedItem> {
    match self.cached_doc(TRENDING_COLLECTION, TRENDING_DOC, None).await {
      Ok(doc) => match doc.as_ref() {
        Some(doc) => normalize_trending(doc, Some(TRENDING_LIMIT)),
        None => {
          warn!("{}/{} document not found", TRENDING_COLLECTION, TRENDING_DOC);
          Vec::new()
        }
      },
      Err(e) => {
        warn!("trending fetch failed: {}", e);
        Vec::new()
      }
    }
  }

  pub async fn fetch_categories(&self) -> Result<Vec<CategoryEntry>, StoreError> {
    let docs = self.store.list_documents(RANKINGS_COLLECTION).await?;
    let mut categories: Vec<CategoryEntry> = docs
      .into_iter()
      .filter(|(id, _)| {
        !EXCLUDED_CATEGORY_IDS
          .iter()
          .any(|excluded| id.eq_ignore_ascii_case(excluded))
      })
      .map(|(id, _)| CategoryEntry {
        name: clean_label(&id),
        id,
      })
      .collect();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(categories)
  }

  pub async fn fetch_trend_dataset(
    &self,
    req: &RankingsRequest,
    top_items: &[RankedItem],
    today: NaiveDate,
  ) -> TrendDataset {
    assemble_trend_dataset(
      self.store.as_ref(),
      &self.cache,
      RANKINGS_COLLECTION,
      req.doc_id(),
      req.window,
      req.platform,
      top_items,
      today,
    )
    .await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::{MemoryStore, StoreErrorKind};
  use serde_json::json;

  fn five_entry_map() -> Value {
    json!({ "all": {
      "alpha": { "reddit_post_count": 10 },
      "bravo": { "reddit_post_count": 50 },
      "charlie": { "reddit_post_count": 30 },
      "delta": { "reddit_post_count": 20 },
      "echo": { "reddit_post_count": 40 }
    }})
  }

  fn dashboard_with_aggregate(doc: Value) -> Dashboard {
    let store = MemoryStore::new().with_doc(
      "all_categories/all_categories/time_windows/7_days",
      doc,
    );
    Dashboard::new(Arc::new(store))
  }

  #[tokio::test]
  async fn end_to_end_reddit_seven_day_ranking() {
    let dashboard = dashboard_with_aggregate(five_entry_map());
    let req = RankingsRequest::new("all_categories", Platform::Reddit, TimeWindow::Days7);

    let out = dashboard.fetch_rankings(&req, None).await.unwrap();
    assert_eq!(out.len(), 5);

    let names: Vec<&str> = out.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["bravo", "echo", "charlie", "delta", "alpha"]);
    let ranks: Vec<usize> = out.iter().map(|i| i.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
  }

  #[tokio::test]
  async fn falls_back_to_latest_daily_when_aggregate_missing() {
    let store = MemoryStore::new().with_recent(
      "all_categories/devices/7_days_daily",
      vec![json!({ "keywords": [{ "keyword": "gadget", "combined_score": 12 }] })],
    );
    let dashboard = Dashboard::new(Arc::new(store));
    let req = RankingsRequest::new("devices", Platform::Combined, TimeWindow::Days7);

    let out = dashboard.fetch_rankings(&req, None).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name, "gadget");
    assert_eq!(out[0].category, "devices");
  }

  #[tokio::test]
  async fn missing_everywhere_is_empty_not_error() {
    let dashboard = Dashboard::new(Arc::new(MemoryStore::new()));
    let req = RankingsRequest::new("ghost", Platform::Reddit, TimeWindow::Days30);
    let out = dashboard.fetch_rankings(&req, None).await.unwrap();
    assert!(out.is_empty());
  }

  #[tokio::test]
  async fn transport_failure_surfaces_as_error() {
    let dashboard = Dashboard::new(Arc::new(MemoryStore::failing()));
    let req = RankingsRequest::new("all", Platform::Reddit, TimeWindow::Days7);
    let err = dashboard.fetch_rankings(&req, None).await.unwrap_err();
    assert_eq!(err.kind, StoreErrorKind::Transport);
  }

  #[tokio::test]
  async fn repeat_fetches_hit_the_cache_across_platforms() {
    let dashboard = dashboard_with_aggregate(five_entry_map());
    let reddit = RankingsRequest::new("all", Platform::Reddit, TimeWindow::Days7);
    let youtube = RankingsRequest::new("all", Platform::Youtube, TimeWindow::Days7);

    dashboard.fetch_rankings(&reddit, None).await.unwrap();
    assert_eq!(dashboard.cache_hits(), 0);

    // Same document serves every platform view of the combination.
    dashboard.fetch_rankings(&youtube, None).await.unwrap();
    assert_eq!(dashboard.cache_hits(), 1);
  }

  #[tokio::test]
  async fn trending_degrades_to_empty_on_failure() {
    let dashboard = Dashboard::new(Arc::new(MemoryStore::failing()));
    assert!(dashboard.fetch_trending().await.is_empty());

    let dashboard = Dashboard::new(Arc::new(MemoryStore::new()));
    assert!(dashboard.fetch_trending().await.is_empty());
  }

  #[tokio::test]
  async fn trending_returns_top_five() {
    let products: Vec<Value> = (0..8)
      .map(|i| json!({ "product_name": format!("tool_{i}"), "score": 100 - i }))
      .collect();
    let store = MemoryStore::new().with_doc(
      "PH-dashboard/top_this_month",
      json!({ "products": products }),
    );
    let dashboard = Dashboard::new(Arc::new(store));

    let trending = dashboard.fetch_trending().await;
    assert_eq!(trending.len(), TRENDING_LIMIT);
    assert_eq!(trending[0].name, "tool_0");
    assert_eq!(trending[4].rank, 5);
  }

  #[tokio::test]
  async fn categories_exclude_internal_docs_and_sort_by_name() {
    let store = MemoryStore::new()
      .with_doc("all_categories/reddit", json!({}))
      .with_doc("all_categories/all_reddit", json!({}))
      .with_doc("all_categories/all_categories", json!({}))
      .with_doc("all_categories/website_builder", json!({}))
      .with_doc("all_categories/ai_chatbots", json!({}));
    let dashboard = Dashboard::new(Arc::new(store));

    let categories = dashboard.fetch_categories().await.unwrap();
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Ai Chatbots", "Website Builder"]);
    assert_eq!(categories[0].id, "ai_chatbots");
  }

  #[test]
  fn request_normalizes_the_all_sentinel() {
    let req = RankingsRequest::new("ALL", Platform::Combined, TimeWindow::Days30);
    assert!(req.is_all_categories());
    assert_eq!(req.doc_id(), CATEGORY_ALL);

    let req = RankingsRequest::new("  devices ", Platform::Combined, TimeWindow::Days30);
    assert_eq!(req.doc_id(), "devices");
  }
}
