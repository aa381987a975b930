//! Server-side rendering for the streaming HTML page.
//!
//! This module provides:
//! - [`Shell`] — The static page shell, computed once per process and split
//!   at a placeholder comment so log rows can be interleaved without
//!   re-rendering
//! - [`render_row`] — One HTML row per record, with per-row data attributes
//!   the client can re-parse to reconstitute records
//! - [`hydration_script`] — The end-of-document activation script
//! - [`login_page`] — Static login form shown when authorization fails

use logwell_model::format::canonical_time;
use logwell_model::Record;

/// Magic comment the shell template is split at.
const ROWS_PLACEHOLDER: &str = "<!-- logwell:rows -->";

/// The pre-rendered page shell, split around the row insertion point.
#[derive(Debug, Clone)]
pub struct Shell {
    /// Everything up to (and excluding) the placeholder.
    pub before_logs: String,
    /// Everything after the placeholder, up to where the hydration script
    /// and closing tags go.
    pub after_logs: String,
}

impl Shell {
    /// Renders the shell template and splits it at the placeholder.
    #[must_use]
    pub fn render() -> Self {
        let template = shell_template();
        match template.split_once(ROWS_PLACEHOLDER) {
            Some((before, after)) => Self {
                before_logs: before.to_string(),
                after_logs: after.to_string(),
            },
            // The template is ours; a missing placeholder would put every
            // row after the shell, which still renders.
            None => Self {
                before_logs: template,
                after_logs: String::new(),
            },
        }
    }
}

/// The document prelude sent before anything is read from disk.
#[must_use]
pub fn document_prelude() -> String {
    concat!(
        "<!doctype html>\n",
        "<html lang=\"en\">\n",
        "<head>\n",
        "<meta charset=\"utf-8\">\n",
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n",
        "<title>logwell</title>\n",
        "<style>\n",
        "body{margin:0;font:13px/1.5 ui-monospace,monospace;background:#111;color:#ddd}\n",
        "header{padding:8px 16px;background:#1b1b1b;border-bottom:1px solid #333}\n",
        "header h1{font-size:14px;margin:0}\n",
        "#logs{padding:8px 16px}\n",
        ".row{white-space:pre-wrap;word-break:break-all;padding:1px 0}\n",
        ".time{color:#888;margin-right:8px}\n",
        ".module{color:#7aa2f7;margin-right:4px}\n",
        ".level-debug .level{color:#666}\n",
        ".level-info .level{color:#9ece6a}\n",
        ".level-warn .level{color:#e0af68}\n",
        ".level-error .level{color:#f7768e}\n",
        ".login{max-width:320px;margin:20vh auto;text-align:center}\n",
        ".login input{width:100%;padding:6px;margin:8px 0;background:#1b1b1b;border:1px solid #333;color:#ddd}\n",
        "</style>\n",
        "</head>\n",
        "<body>\n",
    )
    .to_string()
}

/// The static shell body with the row placeholder.
fn shell_template() -> String {
    concat!(
        "<header><h1>logwell</h1></header>\n",
        "<main id=\"logs\">\n",
        "<!-- logwell:rows -->",
        "</main>\n",
    )
    .to_string()
}

/// Renders one record as an HTML row.
///
/// The record's time, level and module travel as data attributes so the
/// client can rebuild records without a second fetch.
#[must_use]
pub fn render_row(record: &Record) -> String {
    let time = canonical_time(record);
    let mut row = format!(
        "<div class=\"row level-{level}\" data-time=\"{time}\" data-level=\"{level}\"",
        level = escape_html(&record.level),
        time = escape_html(&time),
    );
    if let Some(module) = &record.module {
        row.push_str(&format!(" data-module=\"{}\"", escape_html(module)));
    }
    row.push('>');
    row.push_str(&format!("<span class=\"time\">{}</span>", escape_html(&time)));
    row.push_str(&format!(
        "<span class=\"level\">[{}]</span> ",
        escape_html(&record.level)
    ));
    if let Some(module) = &record.module {
        row.push_str(&format!(
            "<span class=\"module\">{}:</span> ",
            escape_html(module)
        ));
    }
    row.push_str(&escape_html(&record.msg));
    row.push_str("</div>\n");
    row
}

/// The end-of-document activation script plus closing tags.
///
/// Records the session secret and how many rows were streamed, then closes
/// the document.
#[must_use]
pub fn hydration_script(secret: &str, row_count: usize) -> String {
    // JSON-encoding plus a `<` escape makes the secret safe to embed in a
    // script context; a literal `</script>` inside would end the tag early.
    let secret_js = serde_json::to_string(secret)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace('<', "\\u003c");
    format!(
        "<script>window.__logwell={{pwd:{secret_js},count:{row_count},version:\"{version}\"}};</script>\n</body>\n</html>\n",
        version = env!("CARGO_PKG_VERSION"),
    )
}

/// The static login page served when the secret is missing or wrong.
#[must_use]
pub fn login_page() -> String {
    let mut page = document_prelude();
    page.push_str(concat!(
        "<div class=\"login\">\n",
        "<h1>logwell</h1>\n",
        "<form method=\"get\" action=\"/\">\n",
        "<input type=\"password\" name=\"pwd\" placeholder=\"password\" autofocus>\n",
        "<input type=\"submit\" value=\"view logs\">\n",
        "</form>\n",
        "</div>\n",
        "</body>\n",
        "</html>\n",
    ));
    page
}

/// Escapes text for HTML element and attribute contexts.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
