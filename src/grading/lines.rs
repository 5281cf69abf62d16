//! Line numbering of submissions and mapping model line references back to
//! character ranges.

/// Prefix every line of the submission with its 1-based line number, the way
/// the model sees it (`<number>: <line>`).
pub fn number_lines(text: &str) -> String {
    text.lines().enumerate().map(|(index, line)| format!("{}: {}", index + 1, line)).collect::<Vec<_>>().join("\n")
}

/// Character offsets `(start, end)` of each line in the text, exclusive of
/// the line terminator (`\n` or `\r\n`, matching `str::lines`).
fn line_offsets(text: &str) -> Vec<(usize, usize)> {
    let mut offsets = Vec::new();
    let mut line_start = 0usize;
    let mut position = 0usize;
    let mut previous = '\0';

    for ch in text.chars() {
        if ch == '\n' {
            let line_end = if previous == '\r' { position - 1 } else { position };
            offsets.push((line_start, line_end));
            line_start = position + 1;
        }
        position += 1;
        previous = ch;
    }

    // Final line, unless the text ends with a newline (matching `str::lines`).
    if line_start < position {
        offsets.push((line_start, position));
    }

    offsets
}

/// Map a 1-based line range from the model to a character index range into
/// the submission text.
///
/// Either bound may be absent and falls back to the other; out-of-range
/// lines clamp to the text. Returns `None` for unreferenced feedback (both
/// bounds absent) or empty text.
pub fn index_range_for_lines(text: &str, line_start: Option<u32>, line_end: Option<u32>) -> Option<(usize, usize)> {
    let start_line = line_start.or(line_end)?;
    let end_line = line_end.or(line_start)?;

    let offsets = line_offsets(text);
    if offsets.is_empty() {
        return None;
    }

    let clamp = |line: u32| -> usize { (line.max(1) as usize).min(offsets.len()) - 1 };

    let start_index = clamp(start_line);
    let end_index = clamp(end_line).max(start_index);

    Some((offsets[start_index].0, offsets[end_index].1))
}
