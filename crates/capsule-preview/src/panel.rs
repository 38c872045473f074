//! HTML for the preview display region and the shell page around it.

use minijinja::{context, Environment};
use serde::Serialize;

use crate::host::PreviewView;
use crate::hub::{PreviewSnapshot, PreviewStatus};

/// Context for rendering the shell page.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    /// Page title
    pub title: String,
    /// Tailwind play CDN script injected into the preview frame
    pub tailwind_cdn: Option<String>,
    /// Path of the preview client script
    pub script_path: String,
    /// Snapshot shown before the websocket connects
    pub snapshot: PreviewSnapshot,
}

/// Template engine using minijinja.
///
/// Every template name ends in `.html`, so interpolated values are
/// HTML-escaped unless marked `safe`.
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Create a template engine with the built-in templates.
    pub fn new() -> Self {
        let mut env = Environment::new();

        env.add_template_owned("panel.html".to_string(), PANEL_TEMPLATE.to_string())
            .expect("Failed to add panel template");
        env.add_template_owned("frame_head.html".to_string(), FRAME_HEAD_TEMPLATE.to_string())
            .expect("Failed to add frame head template");
        env.add_template_owned("frame.html".to_string(), FRAME_TEMPLATE.to_string())
            .expect("Failed to add frame template");
        env.add_template_owned("page.html".to_string(), PAGE_TEMPLATE.to_string())
            .expect("Failed to add page template");

        Self { env }
    }

    /// Render the display region for a view.
    pub fn render_panel(&self, view: &PreviewView) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template("panel.html")?;

        match view {
            PreviewView::Empty => tmpl.render(context! { status => "empty" }),
            PreviewView::Loading => tmpl.render(context! { status => "loading" }),
            PreviewView::Mounted(html) => tmpl.render(context! { status => "ready", html => html }),
            PreviewView::PreviewError(error) => tmpl.render(context! {
                status => "preview_error",
                title => error.kind().title(),
                kind => error.kind().as_str(),
                message => error.message(),
            }),
            PreviewView::RuntimeError(message) => tmpl.render(context! {
                status => "runtime_error",
                title => "Runtime Error",
                kind => "runtime_render",
                message => message,
            }),
        }
    }

    /// Standalone document for the preview frame.
    pub fn render_frame(
        &self,
        panel: &str,
        tailwind_cdn: Option<&str>,
    ) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template("frame.html")?;
        tmpl.render(context! { panel => panel, tailwind_cdn => tailwind_cdn })
    }

    /// Render the Preview / Code shell page.
    pub fn render_page(&self, page: &PageContext) -> Result<String, minijinja::Error> {
        let panel = match page.snapshot.status {
            PreviewStatus::Empty => self.render_panel(&PreviewView::Empty)?,
            _ => page.snapshot.html.clone(),
        };
        let frame = self.render_frame(&panel, page.tailwind_cdn.as_deref())?;
        let tmpl = self.env.get_template("page.html")?;

        tmpl.render(context! {
            title => &page.title,
            tailwind_cdn => &page.tailwind_cdn,
            script_path => &page.script_path,
            snapshot => &page.snapshot,
            frame => frame,
        })
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::new()
    }
}

const PANEL_TEMPLATE: &str = r##"{% if status == "ready" -%}
{{ html | safe }}
{%- elif status == "loading" -%}
<div class="capsule-panel capsule-loading" role="status">
  <div class="capsule-spinner"></div>
  <p>Compiling preview...</p>
</div>
{%- elif status == "preview_error" or status == "runtime_error" -%}
<div class="capsule-panel capsule-error capsule-{{ status | replace("_", "-") }}" role="alert" data-kind="{{ kind }}">
  <h3>{{ title }}</h3>
  <pre class="max-h-[200px] overflow-auto">{{ message }}</pre>
</div>
{%- else -%}
<div class="capsule-panel capsule-empty">
  <p>Waiting for source...</p>
</div>
{%- endif %}"##;

const FRAME_HEAD_TEMPLATE: &str = r##"<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
{% if tailwind_cdn %}<script src="{{ tailwind_cdn }}"></script>
{% endif %}<style>
  .capsule-panel { font-family: system-ui, sans-serif; }
  .capsule-loading, .capsule-empty { display: flex; flex-direction: column; align-items: center; justify-content: center; min-height: 90vh; color: #71717a; }
  .capsule-spinner { width: 2rem; height: 2rem; margin-bottom: 0.5rem; border: 2px solid #10b981; border-top-color: transparent; border-radius: 9999px; animation: capsule-spin 1s linear infinite; }
  @keyframes capsule-spin { to { transform: rotate(360deg); } }
  .capsule-error { margin: 1rem; padding: 1.5rem; border-radius: 0.5rem; border: 1px solid rgba(127, 29, 29, 0.5); background: rgba(69, 10, 10, 0.2); color: #f87171; }
  .capsule-error h3 { margin: 0 0 0.5rem; font-size: 1.125rem; font-weight: 600; }
  .capsule-error pre { margin: 0; padding: 1rem; max-height: 200px; overflow: auto; font-size: 0.75rem; white-space: pre-wrap; border-radius: 0.25rem; background: rgba(0, 0, 0, 0.4); color: #fca5a5; }
</style>"##;

const FRAME_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
{% include "frame_head.html" %}
</head>
<body>
{{ panel | safe }}
</body>
</html>"##;

const PAGE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title }}</title>
  <style>
    * { box-sizing: border-box; }
    body { margin: 0; height: 100vh; display: flex; flex-direction: column; font-family: system-ui, sans-serif; background: #09090b; color: #e4e4e7; }
    header { display: flex; align-items: center; gap: 1rem; padding: 0.75rem 1rem; border-bottom: 1px solid #27272a; }
    header h1 { margin: 0; font-size: 1rem; font-weight: 600; }
    .tabs { display: flex; gap: 0.25rem; margin-left: auto; }
    .tabs button { padding: 0.375rem 0.75rem; border: 1px solid #3f3f46; border-radius: 0.375rem; background: transparent; color: inherit; cursor: pointer; }
    .tabs button.active { background: #27272a; }
    .status { font-size: 0.75rem; padding: 0.125rem 0.5rem; border-radius: 9999px; background: #27272a; }
    .status[data-status="ready"] { color: #34d399; }
    .status[data-status="preview_error"], .status[data-status="runtime_error"] { color: #f87171; }
    main { flex: 1; min-height: 0; padding: 1rem; }
    .view { width: 100%; height: 100%; }
    iframe.view { border: 1px solid #27272a; border-radius: 0.5rem; background: #fff; }
    pre.view { margin: 0; overflow: auto; padding: 1rem; border: 1px solid #27272a; border-radius: 0.5rem; font-size: 0.8125rem; }
  </style>
</head>
<body>
  <header>
    <h1>{{ title }}</h1>
    <span id="capsule-status" class="status" data-status="{{ snapshot.status }}">{{ snapshot.status | replace("_", " ") }}</span>
    <nav class="tabs">
      <button type="button" class="active" data-capsule-tab="preview">Preview</button>
      <button type="button" data-capsule-tab="code">Code</button>
    </nav>
  </header>
  <main>
    <iframe id="capsule-frame" class="view" data-capsule-view="preview" title="Preview" sandbox="allow-scripts" srcdoc="{{ frame }}"></iframe>
    <pre id="capsule-code" class="view" data-capsule-view="code" hidden><code>{{ snapshot.source }}</code></pre>
  </main>
  <template id="capsule-frame-head">{% include "frame_head.html" %}</template>
  <script src="{{ script_path }}"></script>
</body>
</html>"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::host::Ticket;

    #[test]
    fn renders_loading_indicator() {
        let html = Templates::new().render_panel(&PreviewView::Loading).unwrap();

        assert!(html.contains("Compiling preview..."));
        assert!(html.contains("capsule-loading"));
    }

    #[test]
    fn mounted_markup_is_not_escaped() {
        let html = Templates::new()
            .render_panel(&PreviewView::Mounted("<h1>Hi</h1>".into()))
            .unwrap();

        assert_eq!(html, "<h1>Hi</h1>");
    }

    #[test]
    fn error_message_is_escaped_verbatim() {
        let view = PreviewView::PreviewError(PipelineError::Transform(
            "generated.tsx: Unexpected token `<div>`".into(),
        ));

        let html = Templates::new().render_panel(&view).unwrap();

        assert!(html.contains("<h3>Preview Error</h3>"));
        assert!(html.contains("Unexpected token `&lt;div&gt;`"));
        assert!(html.contains(r#"<pre class="max-h-[200px] overflow-auto">"#));
        assert!(html.contains(r#"data-kind="transform""#));
    }

    #[test]
    fn runtime_error_panel() {
        let html = Templates::new()
            .render_panel(&PreviewView::RuntimeError("boom".into()))
            .unwrap();

        assert!(html.contains("<h3>Runtime Error</h3>"));
        assert!(html.contains("capsule-runtime-error"));
        assert!(html.contains(">boom</pre>"));
    }

    #[test]
    fn frame_includes_tailwind_when_configured() {
        let templates = Templates::new();

        let with = templates
            .render_frame("<p>x</p>", Some("https://cdn.tailwindcss.com"))
            .unwrap();
        let without = templates.render_frame("<p>x</p>", None).unwrap();

        assert!(with.contains(r#"<script src="https://cdn.tailwindcss.com"></script>"#));
        assert!(!without.contains("<script"));
        assert!(without.contains("<body>\n<p>x</p>\n</body>"));
    }

    #[test]
    fn page_embeds_escaped_frame_and_source() {
        let page = PageContext {
            title: "Capsule".to_string(),
            tailwind_cdn: None,
            script_path: "/__preview.js".to_string(),
            snapshot: PreviewSnapshot {
                ticket: Ticket(1),
                status: PreviewStatus::Ready,
                html: "<p>x</p>".to_string(),
                source: "const a = <b/>;".to_string(),
                ..PreviewSnapshot::default()
            },
        };

        let html = Templates::new().render_page(&page).unwrap();

        assert!(html.contains("<title>Capsule</title>"));
        assert!(html.contains("srcdoc=\"&lt;!DOCTYPE html&gt;"));
        assert!(html.contains("&lt;p&gt;x&lt;&#x2f;p&gt;"));
        assert!(html.contains("const a = &lt;b&#x2f;&gt;;"));
        assert!(html.contains(r#"<script src="/__preview.js"></script>"#));
    }
}
