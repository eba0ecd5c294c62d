use serde_json::Value;

pub const DEFAULT_CATEGORY: &str = "General";

// Aggregate-bucket labels that sometimes leak into stored entries. They are
// never real products and must not surface in a ranking.
const DISALLOWED_NAMES: [&str; 8] = [
  "all",
  "total",
  "summary",
  "aggregated",
  "combined",
  "misc",
  "other",
  "unknown",
];

// Name resolution order for entries keyed by an opaque numeric id.
const NAME_FIELDS: [&str; 4] = ["keyword", "name", "product_name", "productName"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
  Combined,
  Reddit,
  Youtube,
}

impl Platform {
  pub fn parse(input: &str) -> Option<Platform> {
    match input.trim().to_lowercase().as_str() {
      "all" | "combined" => Some(Platform::Combined),
      "reddit" => Some(Platform::Reddit),
      "youtube" => Some(Platform::Youtube),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Platform::Combined => "all",
      Platform::Reddit => "reddit",
      Platform::Youtube => "youtube",
    }
  }

  pub(crate) fn score_fields(self) -> &'static [&'static str] {
    match self {
      Platform::Reddit => &["reddit_post_count", "post_count", "postCount"],
      Platform::Youtube => &["youtube_video_count", "video_count", "videoCount"],
      Platform::Combined => &["combined_score", "post_count"],
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
  Days7,
  Days30,
  Days90,
}

impl TimeWindow {
  pub fn parse(input: &str) -> Option<TimeWindow> {
    match input.trim().trim_end_matches('d') {
      "7" => Some(TimeWindow::Days7),
      "30" => Some(TimeWindow::Days30),
      "90" => Some(TimeWindow::Days90),
      _ => None,
    }
  }

  pub fn days(self) -> u32 {
    match self {
      TimeWindow::Days7 => 7,
      TimeWindow::Days30 => 30,
      TimeWindow::Days90 => 90,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      TimeWindow::Days7 => "7",
      TimeWindow::Days30 => "30",
      TimeWindow::Days90 => "90",
    }
  }

  // 7 consecutive daily buckets for the short window, 6 coarser snapshots
  // (weekly for 30d, monthly for 90d) otherwise.
  pub fn bucket_count(self) -> usize {
    match self {
      TimeWindow::Days7 => 7,
      TimeWindow::Days30 | TimeWindow::Days90 => 6,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedItem {
  pub rank: usize,
  pub name: String,
  pub category: String,
  pub score: f64,
  pub velocity: f64,
  pub momentum: f64,
}

// The two stored record shapes: an ordered sequence whose position is
// pre-significant, or a map keyed by slug/name or an opaque numeric string.
pub(crate) enum RawShape<'a> {
  Sequence(&'a [Value]),
  KeyedMap(&'a serde_json::Map<String, Value>),
}

pub(crate) fn detect_shape(doc: &Value) -> Option<RawShape<'_>> {
  if let Some(keywords) = doc.get("keywords") {
    if let Some(items) = keywords.as_array() {
      return Some(RawShape::Sequence(items));
    }
    if let Some(map) = keywords.as_object() {
      return Some(RawShape::KeyedMap(map));
    }
  }
  if let Some(map) = doc.get("all").and_then(|v| v.as_object()) {
    return Some(RawShape::KeyedMap(map));
  }
  if let Some(items) = doc.get("products").and_then(|v| v.as_array()) {
    return Some(RawShape::Sequence(items));
  }
  None
}

// Diagnostic label for the detected raw shape; used by the inspector CLI.
pub fn shape_name(doc: &Value) -> Option<&'static str> {
  detect_shape(doc).map(|shape| match shape {
    RawShape::Sequence(_) => "sequence",
    RawShape::KeyedMap(_) => "keyed-map",
  })
}

pub fn is_disallowed_name(name: &str) -> bool {
  let name = name.trim();
  DISALLOWED_NAMES.iter().any(|d| name.eq_ignore_ascii_case(d))
}

pub(crate) fn numeric_field(entry: &Value, keys: &[&str]) -> Option<f64> {
  keys.iter().find_map(|k| entry.get(*k).and_then(|v| v.as_f64()))
}

fn string_field<'a>(entry: &'a Value, key: &str) -> Option<&'a str> {
  entry
    .get(key)
    .and_then(|v| v.as_str())
    .map(str::trim)
    .filter(|v| !v.is_empty())
}

// Map-shape keys are either the product name itself or an opaque numeric id;
// for numeric ids the true name lives inside the metrics object.
pub(crate) fn resolve_name(key: Option<&str>, entry: &Value) -> Option<String> {
  if let Some(key) = key {
    let key = key.trim();
    if !key.is_empty() && !key.chars().all(|c| c.is_ascii_digit()) {
      return Some(key.to_string());
    }
  }
  NAME_FIELDS
    .iter()
    .find_map(|f| string_field(entry, f))
    .map(str::to_string)
}

fn resolve_category(entry: &Value, source_category: &str) -> String {
  if let Some(category) = string_field(entry, "category") {
    if !is_disallowed_name(category) {
      return category.to_string();
    }
  }
  let source = source_category.trim();
  if !source.is_empty() && !is_disallowed_name(source) {
    return source.to_string();
  }
  DEFAULT_CATEGORY.to_string()
}

struct Candidate {
  name: String,
  category: String,
  score: f64,
  velocity: f64,
  momentum: f64,
  explicit_rank: Option<f64>,
}

fn extract_candidate(
  key: Option<&str>,
  entry: &Value,
  platform: Platform,
  source_category: &str,
) -> Option<Candidate> {
  if !entry.is_object() {
    return None;
  }

  let name = resolve_name(key, entry)?;
  if is_disallowed_name(&name) {
    return None;
  }

  let score_present = platform
    .score_fields()
    .iter()
    .any(|f| entry.get(*f).and_then(|v| v.as_f64()).is_some());
  let velocity = numeric_field(entry, &["velocity"]);
  if !score_present && velocity.is_none() {
    // Nothing relevant to this platform view at all.
    return None;
  }

  let score = numeric_field(entry, platform.score_fields()).unwrap_or(0.0);
  let explicit_rank = numeric_field(entry, &["rank"]);
  if score == 0.0 && velocity.unwrap_or(0.0) == 0.0 && explicit_rank.is_none() {
    // Zero score with no velocity/rank signal means "not applicable to this
    // view", not "ranked last".
    return None;
  }

  Some(Candidate {
    name,
    category: resolve_category(entry, source_category),
    score,
    velocity: velocity.unwrap_or(0.0),
    momentum: numeric_field(entry, &["momentum", "acceleration"]).unwrap_or(0.0),
    explicit_rank,
  })
}

fn assign_ranks(candidates: Vec<Candidate>, limit: Option<usize>) -> Vec<RankedItem> {
  let take = limit.unwrap_or(candidates.len());
  candidates
    .into_iter()
    .take(take)
    .enumerate()
    .map(|(idx, c)| RankedItem {
      rank: idx + 1,
      name: c.name,
      category: c.category,
      score: c.score,
      velocity: c.velocity,
      momentum: c.momentum,
    })
    .collect()
}

pub fn normalize_rankings(
  doc: &Value,
  platform: Platform,
  source_category: &str,
  limit: Option<usize>,
) -> Vec<RankedItem> {
  let Some(shape) = detect_shape(doc) else {
    return Vec::new();
  };

  let from_sequence = matches!(shape, RawShape::Sequence(_));
  let mut candidates: Vec<Candidate> = Vec::new();
  match shape {
    RawShape::Sequence(items) => {
      for entry in items {
        if let Some(c) = extract_candidate(None, entry, platform, source_category) {
          candidates.push(c);
        }
      }
    }
    RawShape::KeyedMap(map) => {
      for (key, entry) in map {
        if let Some(c) = extract_candidate(Some(key.as_str()), entry, platform, source_category) {
          candidates.push(c);
        }
      }
    }
  }

  // Ordering: a stored per-entry rank wins over everything; a sequence is
  // trusted as pre-ordered only when no entry states a rank; a map has no
  // order and is sorted by the selected score. All sorts are stable so ties
  // keep encounter order.
  let any_rank = candidates.iter().any(|c| c.explicit_rank.is_some());
  if any_rank {
    candidates.sort_by(|a, b| match (a.explicit_rank, b.explicit_rank) {
      (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
      (Some(_), None) => std::cmp::Ordering::Less,
      (None, Some(_)) => std::cmp::Ordering::Greater,
      (None, None) => std::cmp::Ordering::Equal,
    });
  } else if !from_sequence {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
  }

  assign_ranks(candidates, limit)
}

// The trending list ships as a `products` sequence with its own score field
// (vote totals from the upstream launch tracker), or in older documents as an
// `all` map. Order is pre-significant for the sequence form.
pub fn normalize_trending(doc: &Value, limit: Option<usize>) -> Vec<RankedItem> {
  let mut candidates: Vec<Candidate> = Vec::new();
  let mut from_sequence = false;

  if let Some(items) = doc.get("products").and_then(|v| v.as_array()) {
    from_sequence = true;
    for entry in items {
      if let Some(c) = trending_candidate(None, entry) {
        candidates.push(c);
      }
    }
  } else if let Some(map) = doc.get("all").and_then(|v| v.as_object()) {
    for (key, entry) in map {
      if let Some(c) = trending_candidate(Some(key.as_str()), entry) {
        candidates.push(c);
      }
    }
  }

  if !from_sequence {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
  }
  assign_ranks(candidates, limit)
}

fn trending_candidate(key: Option<&str>, entry: &Value) -> Option<Candidate> {
  if !entry.is_object() {
    return None;
  }
  // Unlike the rankings shapes, trending entries carry their display name in
  // the metrics object even when keyed; the key is a last resort.
  let name = NAME_FIELDS
    .iter()
    .find_map(|f| string_field(entry, f))
    .map(str::to_string)
    .or_else(|| {
      let key = key?.trim();
      if key.is_empty() || key.chars().all(|c| c.is_ascii_digit()) {
        return None;
      }
      Some(key.to_string())
    })?;
  if is_disallowed_name(&name) {
    return None;
  }
  Some(Candidate {
    name,
    category: resolve_category(entry, ""),
    score: numeric_field(entry, &["score", "votes"]).unwrap_or(0.0),
    velocity: numeric_field(entry, &["velocity"]).unwrap_or(0.0),
    momentum: numeric_field(entry, &["momentum", "acceleration"]).unwrap_or(0.0),
    explicit_rank: None,
  })
}
