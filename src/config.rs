use serde::Deserialize;
use tracing::warn;

use crate::dashboard::RankingsRequest;
use crate::rankings::{Platform, TimeWindow};

#[derive(Debug, Clone)]
pub struct ConfigError {
  pub message: String,
}

impl std::fmt::Display for ConfigError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "configuration error: {}", self.message)
  }
}

impl std::error::Error for ConfigError {}

// Build matrix for static generation. Defaults mirror the production site;
// test mode shrinks the matrix to a handful of pages for quick runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
  pub output_dir: String,
  pub concurrent_builds: usize,
  pub test_mode: bool,
  pub categories: Vec<String>,
  pub platforms: Vec<String>,
  pub time_windows: Vec<String>,
  pub test_categories: Vec<String>,
  pub test_platforms: Vec<String>,
  pub test_time_windows: Vec<String>,
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      output_dir: "./public".to_string(),
      concurrent_builds: 4,
      test_mode: false,
      categories: [
        "all_categories",
        "ai_chatbots",
        "ai_coding_agents",
        "ai_companions",
        "ai_media_generation",
        "ai_models",
        "automation",
        "devices",
        "general_ai",
        "health_and_fitness",
        "marketing",
        "productivity",
        "robots",
        "social_media",
        "website_builder",
        "ai_research",
        "fintech",
      ]
      .iter()
      .map(|s| s.to_string())
      .collect(),
      platforms: vec!["all".to_string(), "reddit".to_string(), "youtube".to_string()],
      time_windows: vec!["7".to_string(), "30".to_string(), "90".to_string()],
      test_categories: vec!["all_categories".to_string(), "ai_chatbots".to_string()],
      test_platforms: vec!["all".to_string(), "reddit".to_string()],
      test_time_windows: vec!["30".to_string(), "7".to_string()],
    }
  }
}

impl BuildConfig {
  pub fn load(path: Option<&str>) -> Result<BuildConfig, ConfigError> {
    let mut config = match path {
      Some(path) => {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError {
          message: format!("cannot read {path}: {e}"),
        })?;
        serde_json::from_str::<BuildConfig>(&raw).map_err(|e| ConfigError {
          message: format!("invalid config {path}: {e}"),
        })?
      }
      None => BuildConfig::default(),
    };

    if let Ok(dir) = std::env::var("TOOLPULSE_OUTPUT_DIR") {
      let dir = dir.trim();
      if !dir.is_empty() {
        config.output_dir = dir.to_string();
      }
    }
    if let Some(n) = std::env::var("TOOLPULSE_CONCURRENT_BUILDS")
      .ok()
      .and_then(|v| v.parse::<usize>().ok())
    {
      config.concurrent_builds = n;
    }
    config.concurrent_builds = config.concurrent_builds.clamp(1, 16);

    Ok(config)
  }

  pub fn active_categories(&self) -> &[String] {
    if self.test_mode {
      &self.test_categories
    } else {
      &self.categories
    }
  }

  fn active_platforms(&self) -> &[String] {
    if self.test_mode {
      &self.test_platforms
    } else {
      &self.platforms
    }
  }

  fn active_time_windows(&self) -> &[String] {
    if self.test_mode {
      &self.test_time_windows
    } else {
      &self.time_windows
    }
  }

  // Cartesian product of the active matrix. A combination with an
  // unrecognized platform or window is a no-data state: it is skipped with a
  // warning instead of failing the build.
  pub fn combinations(&self) -> Vec<RankingsRequest> {
    let mut out = Vec::new();
    for category in self.active_categories() {
      for platform_str in self.active_platforms() {
        let Some(platform) = Platform::parse(platform_str) else {
          warn!("skipping unknown platform {:?}", platform_str);
          continue;
        };
        for window_str in self.active_time_windows() {
          let Some(window) = TimeWindow::parse(window_str) else {
            warn!("skipping unknown time window {:?}", window_str);
            continue;
          };
          out.push(RankingsRequest::new(category, platform, window));
        }
      }
    }
    out
  }
}
