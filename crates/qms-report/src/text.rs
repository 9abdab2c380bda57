//! Character-width text helpers. Widths count `char`s, not bytes.

/// Greedy word wrap to `width` columns.
///
/// Words longer than a line are split hard. Existing line breaks are kept;
/// an empty input yields one empty line so labels still get a row.
#[must_use]
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_len = 0usize;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > width {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if line_len == 0 { word.len() } else { line_len + 1 + word.len() };
            if needed > width {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line.extend(word.iter());
            line_len += word.len();
        }
        lines.push(line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Cut `value` to `width` characters, marking the cut with an ellipsis.
#[must_use]
pub fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width <= 1 {
        return "…".to_string();
    }
    let mut out: String = value.chars().take(width - 1).collect();
    out.push('…');
    out
}

/// Left-align `value` in a `width`-column cell.
#[must_use]
pub fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    format!("{value}{}", " ".repeat(width.saturating_sub(len)))
}

/// Right-align `value` in a `width`-column cell.
#[must_use]
pub fn pad_left(value: &str, width: usize) -> String {
    let len = value.chars().count();
    format!("{}{value}", " ".repeat(width.saturating_sub(len)))
}

/// Shrink the widest columns one character at a time until the row fits.
///
/// Columns first stop at their header width (at least six characters); if the
/// row still does not fit, they shrink further down to one character.
pub fn fit_widths(widths: &mut [usize], headers: &[&str], max_width: usize) {
    shrink(widths, max_width, |idx| {
        headers.get(idx).map_or(0, |h| h.chars().count()).max(6)
    });
    shrink(widths, max_width, |_| 1);
}

fn shrink(widths: &mut [usize], max_width: usize, floor: impl Fn(usize) -> usize) {
    let separators = widths.len().saturating_sub(1) * 2;
    let mut total = widths.iter().sum::<usize>() + separators;

    while total > max_width {
        let candidate = widths
            .iter()
            .enumerate()
            .filter(|(idx, width)| **width > floor(*idx))
            .max_by_key(|(_, width)| **width)
            .map(|(idx, _)| idx);
        let Some(idx) = candidate else {
            break;
        };
        widths[idx] -= 1;
        total -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(
            wrap("the quick brown fox jumps over the lazy dog", 10),
            ["the quick", "brown fox", "jumps over", "the lazy", "dog"]
        );
    }

    #[test]
    fn long_words_are_split() {
        assert_eq!(wrap("abcdefghij", 4), ["abcd", "efgh", "ij"]);
        assert_eq!(wrap("ok abcdefgh", 4), ["ok", "abcd", "efgh"]);
    }

    #[test]
    fn keeps_explicit_breaks_and_empty_input() {
        assert_eq!(wrap("one\ntwo", 20), ["one", "two"]);
        assert_eq!(wrap("", 20), [""]);
    }

    #[test]
    fn truncates_with_ellipsis() {
        assert_eq!(truncate("calibration", 6), "calib…");
        assert_eq!(truncate("short", 6), "short");
    }

    #[test]
    fn fit_shrinks_widest_first() {
        let mut widths = vec![10, 30, 8];
        fit_widths(&mut widths, &["ID", "Description", "Status"], 40);
        assert_eq!(widths.iter().sum::<usize>() + 4, 40);
        assert_eq!(widths[0], 10);
        assert_eq!(widths[2], 8);
    }

    #[test]
    fn fit_goes_below_headers_when_needed() {
        let mut widths = vec![12, 12, 12];
        fit_widths(&mut widths, &["Responsible", "Description", "Status"], 20);
        assert_eq!(widths.iter().sum::<usize>() + 4, 20);
    }
}
