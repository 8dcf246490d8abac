//! Writes the finished batch to disk for the downstream assemblers.
//!
//! The document and archive assemblers consume only completed jobs' decoded
//! payloads plus titles for naming — failed and unfinished jobs are skipped
//! silently. Interior pages are numbered in display order; the cover, when
//! it completed, gets a fixed name. A `metadata.json` manifest carries the
//! marketplace metadata and the per-page outcome.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::batch::{BatchState, JobKind};
use crate::error::BookforgeError;
use crate::gemini::BookPlan;

/// Outcome of a bundle write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    /// Image files written.
    pub written: usize,
    /// Jobs without a usable payload (failed, unfinished, or undecodable).
    pub skipped: usize,
}

/// Decode every completed job and write the bundle into `dir`.
pub fn write_bundle(
    dir: &Path,
    plan: &BookPlan,
    batch: &BatchState,
) -> Result<ExportSummary, BookforgeError> {
    std::fs::create_dir_all(dir)?;

    let mut summary = ExportSummary {
        written: 0,
        skipped: 0,
    };
    let mut page_number = 0usize;

    for job in &batch.jobs {
        // Every page job consumes a number, written or not, so file names
        // stay stable across retries and re-exports.
        if job.kind == JobKind::Page {
            page_number += 1;
        }
        let Some(payload) = job.result.as_ref() else {
            summary.skipped += 1;
            continue;
        };
        let bytes = match BASE64.decode(payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("  skipping {}: undecodable image payload: {err}", job.title);
                summary.skipped += 1;
                continue;
            }
        };
        let file_name = match job.kind {
            JobKind::Cover => "cover.png".to_string(),
            JobKind::Page => format!("{page_number:02}-{}.png", slug(&job.title)),
        };
        std::fs::write(dir.join(file_name), bytes)?;
        summary.written += 1;
    }

    let metadata = serde_json::json!({
        "title": plan.title,
        "subtitle": plan.subtitle,
        "description": plan.description,
        "keywords": plan.keywords,
        "aspect_ratio": batch.aspect_ratio.id(),
        "pages": batch
            .jobs
            .iter()
            .filter(|j| j.kind == JobKind::Page)
            .map(|j| serde_json::json!({"title": j.title, "state": j.state.to_string()}))
            .collect::<Vec<_>>(),
    });
    std::fs::write(
        dir.join("metadata.json"),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    Ok(summary)
}

/// Filesystem-safe file stem from a page title.
fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_dash = true;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "page".to_string()
    } else {
        trimmed.to_string()
    }
}
