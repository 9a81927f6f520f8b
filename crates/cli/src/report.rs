use crate::commands::{ContextSummary, IndexSummary, PolicySummary};
use anyhow::Result;
use serde::Serialize;
use std::fmt::Write as _;
use theme_code_chunker::Chunk;
use theme_map::LookupResult;
use theme_search::SearchHit;

/// Print `value` as pretty JSON or through `render`.
pub fn emit<T: Serialize>(json: bool, value: &T, render: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", render(value));
    }
    Ok(())
}

pub fn index(summary: &IndexSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Indexed {} ({} files, {} features) -> version {}",
        summary.root.display(),
        summary.files,
        summary.features,
        summary.version
    );
    if let Some(framework) = &summary.framework {
        let _ = writeln!(out, "Framework: {framework}");
    }
    if !summary.entry_points.is_empty() {
        let _ = writeln!(out, "Entry points: {}", summary.entry_points.join(", "));
    }
    out
}

pub fn lookup(result: &LookupResult) -> String {
    let mut out = String::new();
    if result.targets.is_empty() {
        out.push_str("No matching files\n");
        return out;
    }
    for target in &result.targets {
        let _ = writeln!(out, "{:>6.1}  {}  ({})", target.score, target.path, target.purpose);
        for feature in &target.features {
            let _ = writeln!(
                out,
                "          {} L{}-{}  {}",
                feature.slug, feature.lines[0], feature.lines[1], feature.description
            );
        }
    }
    if !result.related.is_empty() {
        let _ = writeln!(out, "Related: {}", result.related.join(", "));
    }
    let _ = writeln!(out, "Confident: {}", result.confident);
    out
}

pub fn chunks(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        let _ = writeln!(
            out,
            "L{}-{}  {:?}  {}",
            chunk.line_start,
            chunk.line_end,
            chunk.kind,
            chunk.identifier().unwrap_or("-")
        );
    }
    out
}

pub fn hits(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for hit in hits {
        let sources: Vec<&str> = hit.sources.iter().map(|s| s.as_str()).collect();
        let _ = writeln!(out, "{:.4}  {}  [{}]", hit.score, hit.path, sources.join("+"));
    }
    out
}

pub fn bundle(summary: &ContextSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} / {} tokens for \"{}\"",
        summary.used_tokens, summary.budget, summary.query
    );
    for file in &summary.included {
        let _ = writeln!(out, "  + {} ({} tokens)", file.path, file.tokens);
    }
    for path in &summary.excluded {
        let _ = writeln!(out, "  - {path} (over budget)");
    }
    for id in &summary.missing {
        let _ = writeln!(out, "  ? {id} (unknown)");
    }
    out
}

pub fn policy(summary: &PolicySummary) -> String {
    let mut out = String::new();
    let t = &summary.thresholds;
    let _ = writeln!(out, "Tier: {}", summary.tier);
    for (name, value) in [
        ("edit_sla_tool_calls", t.edit_sla_tool_calls),
        ("edit_sla_abort_tool_calls", t.edit_sla_abort_tool_calls),
        ("max_stuck_recoveries", t.max_stuck_recoveries),
        ("history_keep_last", t.history_keep_last),
        ("zero_tool_streak_limit", t.zero_tool_streak_limit),
        ("max_completion_nudges", t.max_completion_nudges),
        ("confirm_delete_count", t.confirm_delete_count),
        ("max_premature_stop_nudges", t.max_premature_stop_nudges),
        ("read_only_streak_limit", t.read_only_streak_limit),
        ("post_edit_stagnation_limit", t.post_edit_stagnation_limit),
        ("max_rethinks", t.max_rethinks),
        ("tool_call_soft_cap", t.tool_call_soft_cap),
        ("max_iterations", t.max_iterations),
    ] {
        let _ = writeln!(out, "  {name:<28} {value}");
    }
    out
}
