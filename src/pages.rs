use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::dashboard::{CategoryEntry, RankingsRequest, CATEGORY_ALL};
use crate::rankings::{Platform, RankedItem, TimeWindow};
use crate::text::clean_label;
use crate::timeseries::TrendDataset;

// URL scheme: every segment that matches the default combination
// (all categories, all platforms, 30 days) is omitted, so the default page
// lands at the site root.
pub fn url_path(req: &RankingsRequest) -> String {
  let mut parts: Vec<String> = Vec::new();

  if !req.is_all_categories() {
    parts.push("category".to_string());
    parts.push(req.category.clone());
  }
  if req.platform != Platform::Combined {
    parts.push(req.platform.as_str().to_string());
  }
  if req.window != TimeWindow::Days30 {
    parts.push(format!("{}d", req.window.as_str()));
  }

  if parts.is_empty() {
    "/".to_string()
  } else {
    format!("/{}/", parts.join("/"))
  }
}

pub fn file_path(output_dir: &Path, req: &RankingsRequest) -> PathBuf {
  let url = url_path(req);
  if url == "/" {
    output_dir.join("index.html")
  } else {
    output_dir
      .join(url.trim_matches('/'))
      .join("index.html")
  }
}

pub fn platform_url(req: &RankingsRequest, platform: Platform) -> String {
  let mut switched = req.clone();
  switched.platform = platform;
  url_path(&switched)
}

pub fn window_url(req: &RankingsRequest, window: TimeWindow) -> String {
  let mut switched = req.clone();
  switched.window = window;
  url_path(&switched)
}

pub fn category_url(req: &RankingsRequest, category_id: &str) -> String {
  url_path(&RankingsRequest::new(category_id, req.platform, req.window))
}

pub fn category_display(req: &RankingsRequest) -> String {
  if req.is_all_categories() {
    "All Categories".to_string()
  } else {
    clean_label(&req.category)
  }
}

pub fn platform_display(platform: Platform) -> String {
  match platform {
    Platform::Combined => "All Platforms".to_string(),
    _ => clean_label(platform.as_str()),
  }
}

#[derive(Debug, Clone)]
pub struct SeoData {
  pub title: String,
  pub description: String,
  pub canonical: String,
  pub structured_data: Value,
}

pub fn seo_data(req: &RankingsRequest, rankings: &[RankedItem]) -> SeoData {
  let category = category_display(req);
  let platform = platform_display(req.platform);
  let time = format!("{} Days", req.window.as_str());

  let title = format!("Best AI Tools - {category} ({platform}, {time}) | AI Tools Dashboard");
  let description = format!(
    "Top AI tools rankings for {category} based on {platform} data over {time}. \
     Real-time analytics and performance insights."
  );

  let items: Vec<Value> = rankings
    .iter()
    .take(3)
    .map(|item| {
      serde_json::json!({
        "@type": "ListItem",
        "position": item.rank,
        "name": item.name,
        "description": format!("{} tool with {} points", item.category, item.score),
      })
    })
    .collect();

  let structured_data = serde_json::json!({
    "@context": "https://schema.org",
    "@type": "ItemList",
    "name": title,
    "description": description,
    "numberOfItems": rankings.len(),
    "itemListElement": items,
  });

  SeoData {
    title,
    description,
    canonical: url_path(req),
    structured_data,
  }
}

// Everything one rendered page needs; assembled by the builder, consumed by
// the renderer.
pub struct PageContext {
  pub request: RankingsRequest,
  pub rankings: Vec<RankedItem>,
  pub trending: Vec<RankedItem>,
  pub trend: TrendDataset,
  pub categories: Vec<CategoryEntry>,
  pub seo: SeoData,
  pub generated_on: String,
}

pub fn default_request() -> RankingsRequest {
  RankingsRequest::new(CATEGORY_ALL, Platform::Combined, TimeWindow::Days30)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn req(category: &str, platform: Platform, window: TimeWindow) -> RankingsRequest {
    RankingsRequest::new(category, platform, window)
  }

  #[test]
  fn default_combination_maps_to_root() {
    assert_eq!(url_path(&default_request()), "/");
    assert_eq!(
      file_path(Path::new("public"), &default_request()),
      PathBuf::from("public/index.html")
    );
  }

  #[test]
  fn non_default_segments_appear_in_order() {
    let r = req("devices", Platform::Reddit, TimeWindow::Days7);
    assert_eq!(url_path(&r), "/category/devices/reddit/7d/");
    assert_eq!(
      file_path(Path::new("public"), &r),
      PathBuf::from("public/category/devices/reddit/7d/index.html")
    );
  }

  #[test]
  fn default_segments_are_omitted_individually() {
    assert_eq!(url_path(&req("devices", Platform::Combined, TimeWindow::Days30)), "/category/devices/");
    assert_eq!(url_path(&req("all", Platform::Reddit, TimeWindow::Days30)), "/reddit/");
    assert_eq!(url_path(&req("all", Platform::Combined, TimeWindow::Days90)), "/90d/");
  }

  #[test]
  fn navigation_urls_switch_one_axis_at_a_time() {
    let r = req("devices", Platform::Reddit, TimeWindow::Days7);
    assert_eq!(platform_url(&r, Platform::Combined), "/category/devices/7d/");
    assert_eq!(window_url(&r, TimeWindow::Days30), "/category/devices/reddit/");
    assert_eq!(category_url(&r, "all_categories"), "/reddit/7d/");
    assert_eq!(category_url(&r, "fintech"), "/category/fintech/reddit/7d/");
  }

  #[test]
  fn seo_data_embeds_top_three_structured_items() {
    let rankings: Vec<RankedItem> = (1..=5)
      .map(|i| RankedItem {
        rank: i,
        name: format!("tool{i}"),
        category: "General".to_string(),
        score: (10 - i) as f64,
        velocity: 0.0,
        momentum: 0.0,
      })
      .collect();

    let r = req("ai_chatbots", Platform::Youtube, TimeWindow::Days90);
    let seo = seo_data(&r, &rankings);

    assert!(seo.title.contains("Ai Chatbots"));
    assert!(seo.title.contains("Youtube"));
    assert!(seo.title.contains("90 Days"));
    assert_eq!(seo.canonical, "/category/ai_chatbots/youtube/90d/");
    assert_eq!(seo.structured_data["numberOfItems"], 5);
    assert_eq!(seo.structured_data["itemListElement"].as_array().unwrap().len(), 3);
    assert_eq!(seo.structured_data["itemListElement"][0]["position"], 1);
  }
}
