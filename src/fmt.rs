//! Human-friendly CLI output formatters.
//!
//! Each `fmt_*` function formats one tool's output for terminal display.
//! When `color` is true, ANSI escape codes are emitted via `owo_colors`.

use crate::response::ResponseEnvelope;
use crate::tools::{HealthOutput, IndexOutput, RepairToolOutput, StatsOutput};
use owo_colors::OwoColorize;
use std::io::{self, Write};

// ── search ──────────────────────────────────────────────────────────────────

pub fn fmt_search(w: &mut impl Write, env: &ResponseEnvelope, color: bool) -> io::Result<()> {
    for item in &env.results {
        let line_info = if item.line > 0 {
            format!(":{}", item.line)
        } else {
            String::new()
        };
        let type_info = item
            .containing_type
            .as_deref()
            .map(|t| format!(" in {t}"))
            .unwrap_or_default();

        if color {
            writeln!(
                w,
                "{}{}  ({:.2}{})",
                item.path.bold(),
                line_info,
                item.score,
                type_info.dimmed()
            )?;
        } else {
            writeln!(w, "{}{}  ({:.2}{})", item.path, line_info, item.score, type_info)?;
        }

        for c in &item.context {
            let marker = if c.is_match { ">" } else { " " };
            if color && c.is_match {
                writeln!(w, " {}{}", format_args!("{marker}{:>5}│ ", c.line).green(), c.content)?;
            } else {
                writeln!(w, " {marker}{:>5}│ {}", c.line, c.content)?;
            }
        }
    }

    if env.results_summary.has_more {
        let note = format!(
            "... {} of {} results shown",
            env.results_summary.included, env.results_summary.total
        );
        if color {
            writeln!(w, "{}", note.dimmed())?;
        } else {
            writeln!(w, "{note}")?;
        }
    }

    for insight in &env.insights {
        writeln!(w, "• {insight}")?;
    }

    if let Some(ref token) = env.meta.detail_request_token {
        writeln!(w, "detail token: {token}")?;
    }

    Ok(())
}

// ── stats ───────────────────────────────────────────────────────────────────

pub fn fmt_stats(w: &mut impl Write, out: &StatsOutput, color: bool) -> io::Result<()> {
    if color {
        writeln!(w, "{:<18} {}", "Workspace:".bold(), out.workspace_hash)?;
        writeln!(w, "{:<18} {}", "Documents:".bold(), out.doc_count)?;
        writeln!(w, "{:<18} {}", "Segments:".bold(), out.segment_count)?;
        writeln!(
            w,
            "{:<18} {} ({} bytes)",
            "Index size:".bold(),
            out.index_size_human,
            out.index_size_bytes
        )?;
        writeln!(w, "{:<18} {}", "Live contexts:".bold(), out.live_contexts)?;
    } else {
        writeln!(w, "{:<18} {}", "Workspace:", out.workspace_hash)?;
        writeln!(w, "{:<18} {}", "Documents:", out.doc_count)?;
        writeln!(w, "{:<18} {}", "Segments:", out.segment_count)?;
        writeln!(
            w,
            "{:<18} {} ({} bytes)",
            "Index size:", out.index_size_human, out.index_size_bytes
        )?;
        writeln!(w, "{:<18} {}", "Live contexts:", out.live_contexts)?;
    }

    if out.stale_locks_removed > 0 {
        writeln!(w, "{:<18} {}", "Stale locks:", out.stale_locks_removed)?;
    }
    Ok(())
}

// ── health ──────────────────────────────────────────────────────────────────

pub fn fmt_health(w: &mut impl Write, out: &HealthOutput, color: bool) -> io::Result<()> {
    let state_line = format!("{:<18} {}", "State:", out.state);
    if color && out.state != "open" {
        writeln!(w, "{}", state_line.red())?;
    } else {
        writeln!(w, "{state_line}")?;
    }
    writeln!(w, "{:<18} {}", "Documents:", out.doc_count)?;
    writeln!(w, "{:<18} {}", "Pending docs:", out.pending_docs)?;
    writeln!(
        w,
        "{:<18} writer {} / reader {} (lag {})",
        "Opstamps:", out.committed_opstamp, out.reader_opstamp, out.reader_lag
    )?;
    Ok(())
}

// ── index ───────────────────────────────────────────────────────────────────

pub fn fmt_index(w: &mut impl Write, out: &IndexOutput) -> io::Result<()> {
    writeln!(w, "{}", out.message)?;
    Ok(())
}

// ── repair ──────────────────────────────────────────────────────────────────

pub fn fmt_repair(w: &mut impl Write, out: &RepairToolOutput, color: bool) -> io::Result<()> {
    let verdict = if out.success { "repaired" } else { "still broken" };
    if color {
        if out.success {
            writeln!(w, "{}", verdict.green())?;
        } else {
            writeln!(w, "{}", verdict.red())?;
        }
    } else {
        writeln!(w, "{verdict}")?;
    }
    writeln!(
        w,
        "{} segments removed, {} documents lost",
        out.removed_segments, out.lost_documents
    )?;
    if let Some(ref backup) = out.backup_path {
        writeln!(w, "backup: {backup}")?;
    }
    Ok(())
}
