//! Frame-aware DOM queries.
//!
//! The portal's SPAs move widgets into iframes between releases, so every
//! query here walks the top document plus all reachable (same-origin)
//! iframes recursively inside one `evaluate` call. Cross-origin frames are
//! skipped by the `try/catch` in the walker, which matches what the
//! browser itself allows.

use crate::error::{BrowserError, Result};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// JS prelude defining `collectDocs()`: the top document plus every
/// same-origin iframe document, depth-first.
const FRAME_WALK: &str = r"
    const collectDocs = () => {
        const docs = [];
        const walk = (doc) => {
            if (!doc) return;
            docs.push(doc);
            for (const frame of Array.from(doc.querySelectorAll('iframe, frame'))) {
                try { walk(frame.contentDocument); } catch (e) { /* cross-origin */ }
            }
        };
        walk(document);
        return docs;
    };
";

/// Encode a Rust string as a JS string literal.
#[must_use]
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// Wrap a JS body in an IIFE with `collectDocs()` in scope, so callers can
/// build their own frame-aware queries.
#[must_use]
pub fn with_frame_walk(body: &str) -> String {
    format!("(() => {{ {FRAME_WALK}\n{body} }})()")
}

/// Evaluate a JS expression and deserialize its result.
///
/// # Errors
/// Returns error if evaluation fails or the result does not deserialize.
pub async fn eval_json<T: DeserializeOwned>(page: &Page, js: impl Into<String>) -> Result<T> {
    let result = page
        .evaluate(js.into())
        .await
        .map_err(|e| BrowserError::Evaluation(e.to_string()))?;

    result
        .into_value::<T>()
        .map_err(|e| BrowserError::Evaluation(format!("result did not deserialize: {e}")))
}

/// Visible text of the page including all reachable frames.
///
/// # Errors
/// Returns error if evaluation fails.
pub async fn visible_text(page: &Page) -> Result<String> {
    let js = format!(
        "(() => {{ {FRAME_WALK}
            return collectDocs()
                .map(doc => (doc.body ? doc.body.innerText : ''))
                .join('\\n');
        }})()"
    );
    eval_json(page, js).await
}

/// Whether any frame's visible text contains one of the needles.
///
/// # Errors
/// Returns error if evaluation fails.
pub async fn text_present(page: &Page, needles: &[&str]) -> Result<bool> {
    let needles_js = serde_json::to_string(needles)
        .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
    let js = format!(
        "(() => {{ {FRAME_WALK}
            const needles = {needles_js};
            return collectDocs().some(doc => {{
                const text = doc.body ? doc.body.innerText : '';
                return needles.some(needle => text.includes(needle));
            }});
        }})()"
    );
    eval_json(page, js).await
}

/// Whether a selector matches in any frame.
///
/// # Errors
/// Returns error if evaluation fails.
pub async fn element_exists(page: &Page, selector: &str) -> Result<bool> {
    let selector_js = js_string(selector);
    let js = format!(
        "(() => {{ {FRAME_WALK}
            return collectDocs().some(doc => doc.querySelector({selector_js}) !== null);
        }})()"
    );
    eval_json(page, js).await
}

/// Click the first element matching the selector in any frame.
///
/// Returns `false` when nothing matched.
///
/// # Errors
/// Returns error if evaluation fails.
pub async fn click_element(page: &Page, selector: &str) -> Result<bool> {
    let selector_js = js_string(selector);
    let js = format!(
        "(() => {{ {FRAME_WALK}
            for (const doc of collectDocs()) {{
                const el = doc.querySelector({selector_js});
                if (el) {{ el.click(); return true; }}
            }}
            return false;
        }})()"
    );
    eval_json(page, js).await
}

/// Click the first *visible* button-like element whose text contains one
/// of the captions (`Continuar`, `Aceptar`, ...), searching every frame.
///
/// Returns `false` when no such control is visible.
///
/// # Errors
/// Returns error if evaluation fails.
pub async fn click_visible_button(page: &Page, captions: &[&str]) -> Result<bool> {
    let captions_js = serde_json::to_string(captions)
        .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
    let js = format!(
        "(() => {{ {FRAME_WALK}
            const captions = {captions_js};
            for (const doc of collectDocs()) {{
                const candidates = Array.from(
                    doc.querySelectorAll('button, a, input[type=\"button\"], input[type=\"submit\"]')
                );
                const target = candidates.find(el => {{
                    if (el.offsetParent === null) return false;
                    const text = (el.innerText || el.value || '').trim();
                    return captions.some(caption => text.includes(caption));
                }});
                if (target) {{ target.click(); return true; }}
            }}
            return false;
        }})()"
    );
    eval_json(page, js).await
}

/// Set an input's value and fire the `input`/`change` events the SPA's
/// bindings listen on. Plain `type_str` misses reactive widgets here.
///
/// Returns `false` when the input was not found.
///
/// # Errors
/// Returns error if evaluation fails.
pub async fn set_input_value(page: &Page, selector: &str, value: &str) -> Result<bool> {
    let selector_js = js_string(selector);
    let value_js = js_string(value);
    let js = format!(
        "(() => {{ {FRAME_WALK}
            for (const doc of collectDocs()) {{
                const el = doc.querySelector({selector_js});
                if (el) {{
                    el.value = {value_js};
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return true;
                }}
            }}
            return false;
        }})()"
    );
    eval_json(page, js).await
}

/// Select a `<select>` option by its visible label, in any frame.
///
/// Returns `false` when the select or the option was not found.
///
/// # Errors
/// Returns error if evaluation fails.
pub async fn select_option_by_label(page: &Page, selector: &str, label: &str) -> Result<bool> {
    let selector_js = js_string(selector);
    let label_js = js_string(label);
    let js = format!(
        "(() => {{ {FRAME_WALK}
            for (const doc of collectDocs()) {{
                const select = doc.querySelector({selector_js});
                if (!select) continue;
                const option = Array.from(select.options)
                    .find(opt => opt.label.trim() === {label_js} || opt.value === {label_js});
                if (!option) return false;
                select.value = option.value;
                select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }}
            return false;
        }})()"
    );
    eval_json(page, js).await
}

/// Scroll every frame to the bottom so lazily rendered rows materialize.
///
/// # Errors
/// Returns error if evaluation fails.
pub async fn scroll_to_bottom(page: &Page) -> Result<()> {
    let js = format!(
        "(() => {{ {FRAME_WALK}
            for (const doc of collectDocs()) {{
                const el = doc.scrollingElement || doc.documentElement;
                if (el) el.scrollTop = el.scrollHeight;
            }}
            return true;
        }})()"
    );
    let _: bool = eval_json(page, js).await?;
    Ok(())
}

/// Write a full-page diagnostic screenshot under `dir`.
///
/// Never fails the caller: on any error a warning is logged and `None`
/// returned, since diagnostics must not mask the failure being diagnosed.
pub async fn capture_diagnostic(page: &Page, dir: &Path, tag: &str) -> Option<PathBuf> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(error = %e, dir = %dir.display(), "could not create artifact dir");
        return None;
    }

    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    let path = dir.join(format!("{tag}_{stamp}.png"));

    let params = ScreenshotParams::builder().full_page(true).build();
    match page.save_screenshot(params, &path).await {
        Ok(_) => {
            debug!(path = %path.display(), "captured diagnostic screenshot");
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, "diagnostic screenshot failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("plain"), "\"plain\"");
        assert_eq!(js_string("a'b\"c"), "\"a'b\\\"c\"");
        assert_eq!(js_string("line\nbreak"), "\"line\\nbreak\"");
    }

    #[test]
    fn test_with_frame_walk_wraps_body() {
        let js = with_frame_walk("return collectDocs().length;");
        assert!(js.starts_with("(() => {"));
        assert!(js.contains("collectDocs().length"));
        assert!(js.trim_end().ends_with("})()"));
    }

    #[test]
    fn test_frame_walk_prelude_shape() {
        // The prelude must define the walker every query depends on and
        // must swallow cross-origin access errors.
        assert!(FRAME_WALK.contains("collectDocs"));
        assert!(FRAME_WALK.contains("contentDocument"));
        assert!(FRAME_WALK.contains("catch"));
    }
}
