//! Layered field extraction by tax code.
//!
//! A code like `538` appears on the form only as an ambiguous on-screen
//! label; the value sits somewhere nearby, and the portal rearranges the
//! DOM between releases. Extraction therefore runs a fixed ladder of
//! search stages, each a pure function over a frame-aware DOM snapshot,
//! and replays the whole ladder against every frame of every open page,
//! stopping at the first hit. A code that no stage resolves is the `0`
//! sentinel, recorded as missing, never a fatal error.

use chromiumoxide::Page;
use sii_browser::dom;
use sii_core::{parse_amount, ProgressReporter};
use sii_codes::CodeSet;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Input id/name fragments historically used by the form for code fields.
const INPUT_NAME_PATTERNS: &[&str] = &["CDG", "cod_", "codigo", "c_"];

/// Search stage identifiers, in ladder order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    DirectInput,
    LabelRow,
    InlineSplit,
}

impl Stage {
    fn name(self) -> &'static str {
        match self {
            Self::DirectInput => "direct-input",
            Self::LabelRow => "label-row",
            Self::InlineSplit => "inline-split",
        }
    }
}

/// Stateless extractor over page handles.
pub struct FieldExtractor;

impl FieldExtractor {
    /// Extract the value for a code from any frame of any of the pages.
    ///
    /// `None` means every stage missed on every page; the caller records
    /// the code as missing and continues.
    pub async fn extract(pages: &[&Page], code: &str) -> Option<i64> {
        for page in pages {
            if let Some(value) = Self::extract_from_page(page, code).await {
                return Some(value);
            }
        }
        None
    }

    /// Extract every code of a set, emitting one progress line per code.
    ///
    /// Returns the code→value map (misses at 0) and the list of misses.
    pub async fn extract_set(
        pages: &[&Page],
        codes: &CodeSet,
        progress: &ProgressReporter,
    ) -> (BTreeMap<String, i64>, Vec<String>) {
        let mut values = BTreeMap::new();
        let mut missing = Vec::new();

        for def in &codes.codes {
            match Self::extract(pages, &def.code).await {
                Some(value) => {
                    progress.info(format!("codigo {}: {}", def.code, value));
                    values.insert(def.code.clone(), value);
                }
                None => {
                    debug!(code = %def.code, "code resolved to not-found sentinel");
                    progress.warn(format!("codigo {}: sin valor", def.code));
                    values.insert(def.code.clone(), 0);
                    missing.push(def.code.clone());
                }
            }
        }

        (values, missing)
    }

    async fn extract_from_page(page: &Page, code: &str) -> Option<i64> {
        for stage in [Stage::DirectInput, Stage::LabelRow, Stage::InlineSplit] {
            let candidates = match stage {
                Stage::DirectInput => Self::direct_input_candidates(page, code).await,
                Stage::LabelRow => Self::label_row_candidates(page, code).await,
                Stage::InlineSplit => Self::inline_split_candidates(page, code).await,
            };

            match candidates {
                Ok(candidates) => {
                    if let Some(value) = pick_candidate(&candidates) {
                        trace!(code, stage = stage.name(), value, "stage hit");
                        return Some(value);
                    }
                    trace!(code, stage = stage.name(), "stage miss");
                }
                Err(e) => {
                    // A broken stage is a typed miss, not a failure of the
                    // whole extraction.
                    debug!(code, stage = stage.name(), error = %e, "stage errored");
                }
            }
        }
        None
    }

    /// Stage 1: inputs whose id or name contains the code under one of
    /// the historically-observed naming conventions, or the bare code.
    async fn direct_input_candidates(
        page: &Page,
        code: &str,
    ) -> sii_browser::Result<Vec<String>> {
        let code_js = dom::js_string(code);
        let patterns_js = serde_json::to_string(
            &INPUT_NAME_PATTERNS
                .iter()
                .map(|prefix| format!("{prefix}{code}"))
                .collect::<Vec<_>>(),
        )
        .unwrap_or_else(|_| "[]".to_string());

        let body = format!(
            "const code = {code_js};
            const patterns = {patterns_js};
            const out = [];
            for (const doc of collectDocs()) {{
                for (const el of Array.from(doc.querySelectorAll('input'))) {{
                    const key = (el.id || '') + ' ' + (el.name || '');
                    if (patterns.some(p => key.includes(p)) || key.includes(code)) {{
                        if (el.value) out.push(el.value);
                    }}
                }}
            }}
            return out;"
        );
        dom::eval_json(page, dom::with_frame_walk(&body)).await
    }

    /// Stage 2: exact label match, climb to the nearest row-like ancestor
    /// (bounded hops), return the row's leaf texts minus the label itself.
    async fn label_row_candidates(page: &Page, code: &str) -> sii_browser::Result<Vec<String>> {
        let variants_js = serde_json::to_string(&label_variants(code))
            .unwrap_or_else(|_| "[]".to_string());

        let body = format!(
            "const variants = {variants_js};
            const MAX_HOPS = 4;
            for (const doc of collectDocs()) {{
                const leaves = Array.from(doc.querySelectorAll('*'))
                    .filter(el => el.children.length === 0 && el.innerText);
                const label = leaves.find(el => variants.includes(el.innerText.trim()));
                if (!label) continue;

                let row = label;
                for (let hop = 0; hop < MAX_HOPS && row.parentElement; hop += 1) {{
                    row = row.parentElement;
                    if (row.tagName === 'TR' || row.getAttribute('role') === 'row'
                        || (row.className || '').toString().includes('row')) {{
                        break;
                    }}
                }}

                return Array.from(row.querySelectorAll('*'))
                    .filter(el => el.children.length === 0 && el !== label && el.innerText)
                    .map(el => el.innerText.trim());
            }}
            return [];"
        );
        dom::eval_json(page, dom::with_frame_walk(&body)).await
    }

    /// Stage 3: the code embedded in a larger text node; the trailing
    /// segment after the code is the candidate.
    async fn inline_split_candidates(
        page: &Page,
        code: &str,
    ) -> sii_browser::Result<Vec<String>> {
        let code_js = dom::js_string(code);

        let body = format!(
            "const code = {code_js};
            const out = [];
            for (const doc of collectDocs()) {{
                const leaves = Array.from(doc.querySelectorAll('*'))
                    .filter(el => el.children.length === 0 && el.innerText);
                for (const el of leaves) {{
                    const text = el.innerText.trim();
                    if (text.length > code.length && text.includes(code)) {{
                        const tail = text.split(code).pop();
                        if (tail) out.push(tail.trim());
                    }}
                }}
            }}
            return out;"
        );
        dom::eval_json(page, dom::with_frame_walk(&body)).await
    }
}

/// The exact label spellings stage 2 accepts for a code.
fn label_variants(code: &str) -> Vec<String> {
    vec![
        code.to_string(),
        format!("[{code}]"),
        format!("({code})"),
        format!("{code}:"),
    ]
}

/// Whether a candidate is a currency-shaped value: only digits remain once
/// thousands separators, currency symbols, and spacing are stripped.
///
/// Deliberately stricter than [`clean_amount`] alone, which would accept
/// any text containing a digit.
fn is_currency_shaped(text: &str) -> bool {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '$' | ' ' | '\u{a0}'))
        .collect();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

/// Pick the right-most currency-shaped candidate (row layouts place the
/// label left and the value right) and parse it with the canonical rule.
fn pick_candidate(candidates: &[String]) -> Option<i64> {
    candidates
        .iter()
        .rev()
        .find(|text| is_currency_shaped(text))
        .and_then(|text| parse_amount(text))
}
