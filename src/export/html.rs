use super::helpers::{format_date, format_step_time, html_escape, optimize_screenshot, ImageTarget};
use super::GuideDocument;
use crate::recorder::types::Step;

/// Generate a self-contained HTML document from the guide.
pub fn generate(doc: &GuideDocument) -> String {
    let steps_html: String = doc.steps.iter().map(render_step).collect();
    let count = doc.steps.len();

    let description_html = if doc.description.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="description">{}</p>"#, html_escape(&doc.description))
    };

    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title_esc}</title>
<style>
{css}
</style>
</head>
<body>
<header class="header">
<h1>{title_esc}</h1>
{description_html}
<p class="meta">Generated on {date} &bull; {count} step{plural}</p>
</header>
{steps_html}
</body>
</html>"#,
        title_esc = html_escape(&doc.title),
        css = CSS,
        date = format_date(&doc.generated),
        plural = if count == 1 { "" } else { "s" },
    )
}

fn render_step(step: &Step) -> String {
    let num = step.id;
    let desc = html_escape(&step.description);

    let image_html = step
        .screenshot
        .as_deref()
        .and_then(|url| optimize_screenshot(url, ImageTarget::Web))
        .map(|img| {
            format!(
                r#"
      <div class="step-image"><img src="{}" alt="Step {num}"></div>"#,
                img.data_uri()
            )
        })
        .unwrap_or_default();

    let manual_class = if step.is_manual { " manual" } else { "" };

    format!(
        r#"
    <article class="step{manual_class}">
      <div class="step-header">
        <span class="step-number">{num}</span>
        <span class="step-description">{desc}</span>
      </div>{image_html}
      <div class="step-meta">
        <span class="step-action">{action}</span>
        <span class="step-time">{time}</span>
      </div>
    </article>"#,
        action = step.action,
        time = format_step_time(step.timestamp),
    )
}

const CSS: &str = r#"* { box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 900px; margin: 0 auto; padding: 40px 20px; color: #1e293b; background: #f8fafc; line-height: 1.6; }
.header { text-align: center; margin-bottom: 40px; }
.header h1 { margin-bottom: 8px; }
.description { color: #64748b; font-size: 1.1rem; }
.meta { color: #94a3b8; font-size: 14px; }
.step { margin-bottom: 32px; background: #fff; border: 1px solid #e2e8f0; border-radius: 12px; overflow: hidden; }
.step-header { padding: 16px 20px; background: #6366f1; color: #fff; display: flex; gap: 16px; align-items: center; }
.step.manual .step-header { background: #64748b; }
.step-number { font-weight: 700; width: 32px; height: 32px; border-radius: 50%; background: rgba(255,255,255,0.2); display: flex; align-items: center; justify-content: center; flex-shrink: 0; }
.step-description { font-weight: 500; }
.step-image img { display: block; width: 100%; height: auto; }
.step-meta { padding: 12px 20px; font-size: 14px; color: #64748b; border-top: 1px solid #f1f5f9; display: flex; justify-content: space-between; }
.step-action { background: #f1f5f9; padding: 2px 8px; border-radius: 6px; font-size: 12px; font-weight: 500; color: #475569; }
@media print {
  .step { break-inside: avoid; }
  body { background: #fff !important; color: #1e293b !important; }
  .step-header { background: #6366f1 !important; -webkit-print-color-adjust: exact; }
}
@media (prefers-color-scheme: dark) {
  body { background: #0f172a; color: #f1f5f9; }
  .step { background: #1e293b; border-color: #334155; }
  .step-meta { border-color: #334155; color: #94a3b8; }
  .step-action { background: #334155; color: #e2e8f0; }
}"#;
