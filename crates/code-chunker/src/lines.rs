/// Byte offset to 1-based line number mapping for one file.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            content
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self {
            starts,
            len: content.len(),
        }
    }

    /// 1-based line containing `offset`. Offsets past the end map to the last line.
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.len);
        self.starts.partition_point(|start| *start <= offset).max(1)
    }

    /// Lines covered by the half-open byte range `[start, end)`.
    pub fn span_lines(&self, start: usize, end: usize) -> (usize, usize) {
        let first = self.line_of(start);
        let last = self.line_of(end.saturating_sub(1).max(start));
        (first, last.max(first))
    }

    pub fn line_count(&self) -> usize {
        // A trailing newline does not open a new line.
        if self.len > 0 && self.starts.last() == Some(&self.len) {
            self.starts.len() - 1
        } else {
            self.starts.len()
        }
    }
}

/// Text of lines `first..=last` (1-based).
pub(crate) fn slice_lines(content: &str, first: usize, last: usize) -> String {
    content
        .lines()
        .skip(first.saturating_sub(1))
        .take(last.saturating_sub(first) + 1)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line index (0-based) where a block opened on line `start` closes, counting
/// braces naively. Unclosed blocks run to the last line.
pub(crate) fn balance_end(lines: &[&str], start: usize) -> usize {
    let mut depth: i64 = 0;
    for (idx, line) in lines.iter().enumerate().skip(start) {
        for ch in line.chars() {
            match ch {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
        }
        if depth <= 0 {
            return idx;
        }
    }
    lines.len().saturating_sub(1)
}

/// Collapse runs of whitespace into single spaces.
pub(crate) fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
