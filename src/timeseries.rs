use std::sync::Arc;

use chrono::{Duration, Months, NaiveDate};
use serde_json::Value;
use tracing::{debug, warn};

use crate::rankings::{detect_shape, numeric_field, resolve_name, Platform, RankedItem, RawShape, TimeWindow};
use crate::store::{doc_path, DocumentStore, FetchCache, StoreError};

// A bucket whose exact snapshot is missing is searched backwards this many
// days before it is recorded as zero.
const BACKWARD_SEARCH_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
  pub label: String,
  pub points: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendDataset {
  pub labels: Vec<String>,
  pub series: Vec<TrendSeries>,
}

// Bucket dates, oldest to newest: 7 consecutive days for the 7-day window,
// 6 weekly snapshots for 30 days, 6 monthly snapshots for 90 days.
pub fn bucket_dates(window: TimeWindow, today: NaiveDate) -> Vec<NaiveDate> {
  let count = window.bucket_count();
  (0..count)
    .rev()
    .map(|i| match window {
      TimeWindow::Days7 => today - Duration::days(i as i64),
      TimeWindow::Days30 => today - Duration::days((i * 7) as i64),
      TimeWindow::Days90 => today
        .checked_sub_months(Months::new(i as u32))
        .unwrap_or(today),
    })
    .collect()
}

pub fn time_labels(window: TimeWindow, today: NaiveDate) -> Vec<String> {
  bucket_dates(window, today)
    .into_iter()
    .map(|date| date.format("%b %-d").to_string())
    .collect()
}

// Extract one product's platform score from a daily snapshot document.
// Product matching is case-insensitive on the resolved entry name.
pub fn score_in_snapshot(doc: &Value, product_name: &str, platform: Platform) -> f64 {
  let Some(shape) = detect_shape(doc) else {
    return 0.0;
  };

  let matches = |key: Option<&str>, entry: &Value| -> bool {
    resolve_name(key, entry)
      .map(|name| name.eq_ignore_ascii_case(product_name))
      .unwrap_or(false)
  };

  let entry = match shape {
    RawShape::Sequence(items) => items.iter().find(|entry| matches(None, entry)),
    RawShape::KeyedMap(map) => map
      .iter()
      .find(|(key, entry)| matches(Some(key.as_str()), entry))
      .map(|(_, entry)| entry),
  };

  entry
    .and_then(|e| numeric_field(e, platform.score_fields()))
    .unwrap_or(0.0)
}

async fn cached_daily_doc(
  store: &dyn DocumentStore,
  cache: &FetchCache,
  collection: &str,
  doc_id: &str,
  subcollection: &str,
  date: NaiveDate,
) -> Result<Arc<Option<Value>>, StoreError> {
  let date_str = date.format("%Y-%m-%d").to_string();
  let key = doc_path(collection, doc_id, Some((subcollection, &date_str)));
  if let Some(hit) = cache.get(&key) {
    return Ok(hit);
  }
  let fetched = store
    .get_aggregate(collection, doc_id, Some((subcollection, &date_str)))
    .await?;
  Ok(cache.insert_if_absent(&key, fetched))
}

// Snapshot for a bucket date, searching backwards up to BACKWARD_SEARCH_DAYS
// when the exact date is missing.
async fn snapshot_near(
  store: &dyn DocumentStore,
  cache: &FetchCache,
  collection: &str,
  doc_id: &str,
  subcollection: &str,
  target: NaiveDate,
) -> Result<Arc<Option<Value>>, StoreError> {
  for offset in 0..=BACKWARD_SEARCH_DAYS {
    let date = target - Duration::days(offset);
    let doc = cached_daily_doc(store, cache, collection, doc_id, subcollection, date).await?;
    if doc.is_some() {
      if offset > 0 {
        debug!("snapshot fallback: using {} instead of {}", date, target);
      }
      return Ok(doc);
    }
  }
  Ok(Arc::new(None))
}

async fn recent_daily_points(
  store: &dyn DocumentStore,
  cache: &FetchCache,
  collection: &str,
  doc_id: &str,
  subcollection: &str,
  product_name: &str,
  platform: Platform,
  count: usize,
) -> Result<Vec<f64>, StoreError> {
  let key = format!("{collection}/{doc_id}/{subcollection}:recent:{count}");
  let cached = match cache.get(&key) {
    Some(hit) => hit,
    None => {
      let docs = store
        .query_recent(collection, doc_id, subcollection, "date", true, count)
        .await?;
      cache.insert_if_absent(&key, Some(Value::Array(docs)))
    }
  };

  let mut points: Vec<f64> = cached
    .as_ref()
    .as_ref()
    .and_then(|v| v.as_array())
    .map(|docs| {
      // Query order is newest first; charts run oldest to newest.
      docs
        .iter()
        .rev()
        .map(|doc| score_in_snapshot(doc, product_name, platform))
        .collect()
    })
    .unwrap_or_default();

  while points.len() < count {
    points.insert(0, 0.0);
  }
  points.truncate(count);
  Ok(points)
}

async fn assemble_series(
  store: &dyn DocumentStore,
  cache: &FetchCache,
  collection: &str,
  doc_id: &str,
  window: TimeWindow,
  platform: Platform,
  product_name: String,
  today: NaiveDate,
) -> TrendSeries {
  let subcollection = format!("{}_days_daily", window.as_str());
  let count = window.bucket_count();

  let points = match window {
    TimeWindow::Days7 => {
      recent_daily_points(
        store,
        cache,
        collection,
        doc_id,
        &subcollection,
        &product_name,
        platform,
        count,
      )
      .await
    }
    TimeWindow::Days30 | TimeWindow::Days90 => {
      let mut values = Vec::with_capacity(count);
      let mut failed: Option<StoreError> = None;
      for target in bucket_dates(window, today) {
        match snapshot_near(store, cache, collection, doc_id, &subcollection, target).await {
          Ok(doc) => values.push(
            doc
              .as_ref()
              .as_ref()
              .map(|d| score_in_snapshot(d, &product_name, platform))
              .unwrap_or(0.0),
          ),
          Err(e) => {
            failed = Some(e);
            break;
          }
        }
      }
      match failed {
        Some(e) => Err(e),
        None => Ok(values),
      }
    }
  };

  match points {
    Ok(points) => TrendSeries {
      label: product_name,
      points,
    },
    Err(e) => {
      warn!("trend series fetch failed for {}: {}", product_name, e);
      TrendSeries {
        label: product_name,
        points: vec![0.0; count],
      }
    }
  }
}

// Trend data for the chart: one series per top-ranked item. The per-item
// sub-fetches are independent reads and run concurrently; they share the
// build cache, so overlapping bucket lookups settle on the first fetch.
pub async fn assemble_trend_dataset(
  store: &dyn DocumentStore,
  cache: &FetchCache,
  collection: &str,
  doc_id: &str,
  window: TimeWindow,
  platform: Platform,
  top_items: &[RankedItem],
  today: NaiveDate,
) -> TrendDataset {
  let tasks: Vec<_> = top_items
    .iter()
    .map(|item| {
      assemble_series(
        store,
        cache,
        collection,
        doc_id,
        window,
        platform,
        item.name.clone(),
        today,
      )
    })
    .collect();

  TrendDataset {
    labels: time_labels(window, today),
    series: futures::future::join_all(tasks).await,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;
  use serde_json::json;

  fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn item(name: &str) -> RankedItem {
    RankedItem {
      rank: 1,
      name: name.to_string(),
      category: "General".to_string(),
      score: 1.0,
      velocity: 0.0,
      momentum: 0.0,
    }
  }

  fn daily_doc(name: &str, reddit: i64) -> Value {
    json!({ "keywords": [{ "keyword": name, "reddit_post_count": reddit }] })
  }

  #[test]
  fn bucket_counts_are_fixed_per_window() {
    let today = day(2026, 8, 7);
    assert_eq!(bucket_dates(TimeWindow::Days7, today).len(), 7);
    assert_eq!(bucket_dates(TimeWindow::Days30, today).len(), 6);
    assert_eq!(bucket_dates(TimeWindow::Days90, today).len(), 6);
  }

  #[test]
  fn buckets_run_oldest_to_newest() {
    let today = day(2026, 8, 7);

    let daily = bucket_dates(TimeWindow::Days7, today);
    assert_eq!(daily.first().copied(), Some(day(2026, 8, 1)));
    assert_eq!(daily.last().copied(), Some(today));

    let weekly = bucket_dates(TimeWindow::Days30, today);
    assert_eq!(weekly.first().copied(), Some(day(2026, 7, 3)));
    assert_eq!(weekly.last().copied(), Some(today));

    let monthly = bucket_dates(TimeWindow::Days90, today);
    assert_eq!(monthly.first().copied(), Some(day(2026, 3, 7)));
    assert_eq!(monthly.last().copied(), Some(today));
  }

  #[test]
  fn labels_match_bucket_count() {
    let today = day(2026, 8, 7);
    let labels = time_labels(TimeWindow::Days30, today);
    assert_eq!(labels.len(), 6);
    assert_eq!(labels.last().map(String::as_str), Some("Aug 7"));
  }

  #[test]
  fn snapshot_score_matches_case_insensitively() {
    let doc = json!({ "keywords": [
      { "keyword": "ChatBot", "reddit_post_count": 9, "youtube_video_count": 2 }
    ]});
    assert_eq!(score_in_snapshot(&doc, "chatbot", Platform::Reddit), 9.0);
    assert_eq!(score_in_snapshot(&doc, "chatbot", Platform::Youtube), 2.0);
    assert_eq!(score_in_snapshot(&doc, "other", Platform::Reddit), 0.0);
  }

  #[test]
  fn snapshot_score_handles_numeric_key_maps() {
    let doc = json!({ "all": {
      "0": { "keyword": "Widget", "reddit_post_count": 4 }
    }});
    assert_eq!(score_in_snapshot(&doc, "widget", Platform::Reddit), 4.0);
  }

  #[tokio::test]
  async fn seven_day_series_is_left_padded_to_seven_points() {
    let store = MemoryStore::new().with_recent(
      "all_categories/all_categories/7_days_daily",
      vec![daily_doc("widget", 5), daily_doc("widget", 3)],
    );
    let cache = FetchCache::new();

    let dataset = assemble_trend_dataset(
      &store,
      &cache,
      "all_categories",
      "all_categories",
      TimeWindow::Days7,
      Platform::Reddit,
      &[item("widget")],
      day(2026, 8, 7),
    )
    .await;

    assert_eq!(dataset.labels.len(), 7);
    assert_eq!(dataset.series.len(), 1);
    // Two real values (newest-first from the store, so oldest last here)
    // padded with five leading zeros.
    assert_eq!(dataset.series[0].points, vec![0.0, 0.0, 0.0, 0.0, 0.0, 3.0, 5.0]);
  }

  #[tokio::test]
  async fn thirty_day_series_searches_backwards_for_missing_snapshots() {
    let today = day(2026, 8, 7);
    // Newest bucket snapshot exists two days early; every other bucket is
    // entirely absent.
    let store = MemoryStore::new().with_doc(
      "all_categories/devices/30_days_daily/2026-08-05",
      daily_doc("widget", 11),
    );
    let cache = FetchCache::new();

    let dataset = assemble_trend_dataset(
      &store,
      &cache,
      "all_categories",
      "devices",
      TimeWindow::Days30,
      Platform::Reddit,
      &[item("widget")],
      today,
    )
    .await;

    assert_eq!(dataset.series[0].points.len(), 6);
    assert_eq!(dataset.series[0].points[5], 11.0);
    assert!(dataset.series[0].points[..5].iter().all(|p| *p == 0.0));
  }

  #[tokio::test]
  async fn transport_failure_yields_zeroed_series_not_panic() {
    let store = MemoryStore::failing();
    let cache = FetchCache::new();

    let dataset = assemble_trend_dataset(
      &store,
      &cache,
      "all_categories",
      "all_categories",
      TimeWindow::Days30,
      Platform::Combined,
      &[item("widget")],
      day(2026, 8, 7),
    )
    .await;

    assert_eq!(dataset.series[0].points, vec![0.0; 6]);
  }

  #[tokio::test]
  async fn concurrent_series_share_the_bucket_cache() {
    let today = day(2026, 8, 7);
    let mut store = MemoryStore::new();
    for date in bucket_dates(TimeWindow::Days30, today) {
      store = store.with_doc(
        &format!("all_categories/all_categories/30_days_daily/{}", date.format("%Y-%m-%d")),
        json!({ "keywords": [
          { "keyword": "a", "reddit_post_count": 1 },
          { "keyword": "b", "reddit_post_count": 2 }
        ]}),
      );
    }
    let cache = FetchCache::new();

    let dataset = assemble_trend_dataset(
      &store,
      &cache,
      "all_categories",
      "all_categories",
      TimeWindow::Days30,
      Platform::Reddit,
      &[item("a"), item("b")],
      today,
    )
    .await;

    assert_eq!(dataset.series[0].points, vec![1.0; 6]);
    assert_eq!(dataset.series[1].points, vec![2.0; 6]);
    // The second series reused every bucket document the first one fetched.
    assert!(cache.hit_count() >= 6);
  }
}
