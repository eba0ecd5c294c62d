use crate::dashboard::RankingsRequest;
use crate::pages::{
  category_display, category_url, platform_display, platform_url, window_url, PageContext,
};
use crate::rankings::{Platform, TimeWindow};
use crate::timeseries::TrendDataset;

const PLATFORM_TABS: [Platform; 3] = [Platform::Combined, Platform::Reddit, Platform::Youtube];
const WINDOW_TABS: [TimeWindow; 3] = [TimeWindow::Days7, TimeWindow::Days30, TimeWindow::Days90];

pub fn escape_html(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  for ch in input.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(ch),
    }
  }
  out
}

fn trend_json(trend: &TrendDataset) -> serde_json::Value {
  serde_json::json!({
    "labels": trend.labels,
    "datasets": trend.series.iter().enumerate().map(|(i, s)| {
      let color = ["#ff6b35", "#ff8f65", "#ffb399"].get(i).copied().unwrap_or("#ccc");
      serde_json::json!({
        "label": s.label,
        "data": s.points,
        "color": color,
      })
    }).collect::<Vec<_>>(),
  })
}

fn render_nav(out: &mut String, req: &RankingsRequest, ctx: &PageContext) {
  out.push_str("  <nav class=\"filters\">\n");

  out.push_str("    <div class=\"platform-filters\">\n");
  for platform in PLATFORM_TABS {
    let active = if platform == req.platform { " active" } else { "" };
    out.push_str(&format!(
      "      <a class=\"platform-btn{active}\" href=\"{}\">{}</a>\n",
      escape_html(&platform_url(req, platform)),
      escape_html(&platform_display(platform)),
    ));
  }
  out.push_str("    </div>\n");

  out.push_str("    <div class=\"time-filters\">\n");
  for window in WINDOW_TABS {
    let active = if window == req.window { " active" } else { "" };
    out.push_str(&format!(
      "      <a class=\"time-btn{active}\" href=\"{}\">{}d</a>\n",
      escape_html(&window_url(req, window)),
      window.as_str(),
    ));
  }
  out.push_str("    </div>\n");

  out.push_str("    <ul class=\"category-list\">\n");
  out.push_str(&format!(
    "      <li><a href=\"{}\">All Categories</a></li>\n",
    escape_html(&category_url(req, "all_categories")),
  ));
  for category in &ctx.categories {
    out.push_str(&format!(
      "      <li><a href=\"{}\">{}</a></li>\n",
      escape_html(&category_url(req, &category.id)),
      escape_html(&category.name),
    ));
  }
  out.push_str("    </ul>\n");
  out.push_str("  </nav>\n");
}

pub fn render_page(ctx: &PageContext) -> String {
  let req = &ctx.request;
  let mut out = String::new();

  out.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n");
  out.push_str("  <meta charset=\"utf-8\">\n");
  out.push_str("  <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
  out.push_str(&format!("  <title>{}</title>\n", escape_html(&ctx.seo.title)));
  out.push_str(&format!(
    "  <meta name=\"description\" content=\"{}\">\n",
    escape_html(&ctx.seo.description)
  ));
  out.push_str(&format!(
    "  <link rel=\"canonical\" href=\"{}\">\n",
    escape_html(&ctx.seo.canonical)
  ));
  out.push_str("  <script type=\"application/ld+json\">\n");
  out.push_str(&ctx.seo.structured_data.to_string());
  out.push_str("\n  </script>\n");
  out.push_str("</head>\n<body>\n");

  out.push_str(&format!(
    "  <h1>Best AI Tools - {} <span class=\"subtitle\">({}, {} days)</span></h1>\n",
    escape_html(&category_display(req)),
    escape_html(&platform_display(req.platform)),
    req.window.as_str(),
  ));

  render_nav(&mut out, req, ctx);

  if !ctx.trending.is_empty() {
    out.push_str("  <section class=\"trending\">\n    <h2>New This Month</h2>\n    <ol>\n");
    for item in &ctx.trending {
      out.push_str(&format!(
        "      <li>{} <span class=\"score\">{}</span></li>\n",
        escape_html(&item.name),
        item.score,
      ));
    }
    out.push_str("    </ol>\n  </section>\n");
  }

  if ctx.rankings.is_empty() {
    out.push_str("  <p class=\"empty\">No data available</p>\n");
  } else {
    out.push_str("  <table class=\"ranking-table\">\n");
    out.push_str("    <thead><tr><th>#</th><th>Name</th><th>Category</th><th>Score</th><th>Velocity</th></tr></thead>\n");
    out.push_str("    <tbody>\n");
    for item in &ctx.rankings {
      out.push_str(&format!(
        "      <tr><td>{}</td><td>{}</td><td>{}</td><td class=\"post-count\">{}</td><td class=\"velocity\">{:.1}</td></tr>\n",
        item.rank,
        escape_html(&item.name),
        escape_html(&crate::text::clean_label(&item.category)),
        item.score,
        item.velocity,
      ));
    }
    out.push_str("    </tbody>\n  </table>\n");

    out.push_str("  <section class=\"chart\">\n");
    out.push_str("    <canvas id=\"performanceChart\"></canvas>\n");
    out.push_str("    <script id=\"performance-data\" type=\"application/json\">\n");
    out.push_str(&trend_json(&ctx.trend).to_string());
    out.push_str("\n    </script>\n");
    out.push_str("  </section>\n");
  }

  out.push_str(&format!(
    "  <footer>Generated {}</footer>\n",
    escape_html(&ctx.generated_on)
  ));
  out.push_str("</body>\n</html>\n");
  out
}
