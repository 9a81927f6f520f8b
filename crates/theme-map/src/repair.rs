//! Approximate feature line-range repair after an in-place edit.
//!
//! Keeps the map usable between full reindexes. Ranges fully inside a
//! replaced span cannot be tracked and become `[0, 0]`.

use crate::types::{Feature, ThemeMap, ThemeMapFile};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditKind {
    /// Lines `start..=end` replaced by `new_line_count` lines
    Replace,
    /// `new_line_count` lines inserted before line `start`
    InsertBefore,
    /// `new_line_count` lines inserted after line `end`
    InsertAfter,
}

/// An edit at known 1-based line bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdit {
    pub kind: EditKind,
    pub start: usize,
    pub end: usize,
    pub new_line_count: usize,
}

impl LineEdit {
    pub const fn replace(start: usize, end: usize, new_line_count: usize) -> Self {
        Self {
            kind: EditKind::Replace,
            start,
            end,
            new_line_count,
        }
    }

    pub const fn insert_before(line: usize, new_line_count: usize) -> Self {
        Self {
            kind: EditKind::InsertBefore,
            start: line,
            end: line,
            new_line_count,
        }
    }

    pub const fn insert_after(line: usize, new_line_count: usize) -> Self {
        Self {
            kind: EditKind::InsertAfter,
            start: line,
            end: line,
            new_line_count,
        }
    }

    /// Net change in the file's line count.
    pub fn line_delta(&self) -> isize {
        let added = self.new_line_count as isize;
        match self.kind {
            EditKind::Replace => added - (self.end.saturating_sub(self.start) + 1) as isize,
            EditKind::InsertBefore | EditKind::InsertAfter => added,
        }
    }
}

fn shift(line: usize, delta: isize) -> usize {
    line.saturating_add_signed(delta).max(1)
}

/// Repair one feature range. Returns whether it changed.
pub fn repair_feature(feature: &mut Feature, edit: &LineEdit) -> bool {
    if feature.is_stale() {
        return false;
    }
    let [a, b] = feature.lines;
    let delta = edit.line_delta();

    let repaired = match edit.kind {
        EditKind::Replace => {
            let (start, end) = (edit.start, edit.end.max(edit.start));
            if b < start {
                [a, b]
            } else if a > end {
                [shift(a, delta), shift(b, delta)]
            } else if a >= start && b <= end {
                Feature::STALE
            } else {
                // Straddles the edit: grow to cover the replacement
                let new_end = start + edit.new_line_count.max(1) - 1;
                let first = a.min(start);
                let last = if b > end { shift(b, delta) } else { new_end };
                [first, last.max(first)]
            }
        }
        EditKind::InsertBefore | EditKind::InsertAfter => {
            // First line that moves down
            let at = if edit.kind == EditKind::InsertBefore {
                edit.start
            } else {
                edit.end + 1
            };
            if b < at {
                [a, b]
            } else if a >= at {
                [shift(a, delta), shift(b, delta)]
            } else {
                [a, shift(b, delta)]
            }
        }
    };

    let changed = repaired != feature.lines;
    feature.lines = repaired;
    changed
}

/// Repair every feature of one file. Returns how many ranges changed.
pub fn repair_file(file: &mut ThemeMapFile, edit: &LineEdit) -> usize {
    file.features
        .values_mut()
        .map(|feature| repair_feature(feature, edit))
        .filter(|changed| *changed)
        .count()
}

/// Apply an edit to `path` in the map, bumping the version when anything moved.
pub fn apply_line_edit(map: &mut ThemeMap, path: &str, edit: &LineEdit) -> usize {
    let Some(file) = map.files.get_mut(path) else {
        return 0;
    };
    let changed = repair_file(file, edit);
    if changed > 0 {
        log::debug!("Repaired {changed} feature ranges in {path}");
        map.bump();
    }
    changed
}
