//! Line-oriented report builder and paginator.

use crate::PAGE_BREAK;
use crate::error::ReportError;
use crate::layout::PageLayout;
use crate::text::{fit_widths, pad, pad_left, truncate, wrap};

/// Width of the label column used by [`ReportWriter::field`].
const LABEL_WIDTH: usize = 18;

/// Collects body lines, then lays them out on pages.
///
/// ```
/// use qms_report::{PageLayout, ReportWriter};
///
/// let mut report = ReportWriter::new("Weekly summary", PageLayout::default()).unwrap();
/// report.heading("Totals");
/// report.field("Open NCs", "4");
/// let bytes = report.finish();
/// assert!(String::from_utf8(bytes).unwrap().contains("Page 1 of 1"));
/// ```
#[derive(Debug, Clone)]
pub struct ReportWriter {
    title: String,
    layout: PageLayout,
    lines: Vec<String>,
}

impl ReportWriter {
    /// # Errors
    ///
    /// Returns `ReportError::InvalidLayout` when the page is too small.
    pub fn new(title: impl Into<String>, layout: PageLayout) -> Result<Self, ReportError> {
        layout.validate()?;
        Ok(Self {
            title: title.into(),
            layout,
            lines: Vec::new(),
        })
    }

    #[must_use]
    pub const fn layout(&self) -> PageLayout {
        self.layout
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// Section heading, underlined, preceded by a blank line unless first.
    pub fn heading(&mut self, text: &str) {
        if !self.lines.is_empty() {
            self.blank();
        }
        let text = truncate(text, self.layout.width);
        let underline = "-".repeat(text.chars().count());
        self.lines.push(text);
        self.lines.push(underline);
    }

    /// `label: value`, with the value wrapped under itself.
    pub fn field(&mut self, label: &str, value: &str) {
        let value_width = self.layout.width - LABEL_WIDTH;
        let label = truncate(&format!("{label}:"), LABEL_WIDTH - 1);
        for (i, line) in wrap(value, value_width).into_iter().enumerate() {
            let lead = if i == 0 { label.as_str() } else { "" };
            self.lines.push(format!("{}{line}", pad(lead, LABEL_WIDTH)).trim_end().to_string());
        }
    }

    /// Free text wrapped to the page width, with an optional hanging indent.
    pub fn paragraph(&mut self, text: &str, indent: usize) {
        let width = self.layout.width.saturating_sub(indent).max(1);
        let prefix = " ".repeat(indent);
        for line in wrap(text, width) {
            self.lines.push(format!("{prefix}{line}").trim_end().to_string());
        }
    }

    /// Aligned columns; columns shrink to fit the page and cells are cut.
    pub fn table(&mut self, headers: &[&str], rows: &[Vec<String>]) {
        let mut widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                rows.iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
                    .max(header.chars().count())
            })
            .collect();
        fit_widths(&mut widths, headers, self.layout.width);

        let header = format_row(headers.iter().map(|h| (*h).to_string()), &widths);
        let divider = "-".repeat(header.chars().count());
        self.lines.push(header);
        self.lines.push(divider);
        for row in rows {
            let cells = (0..widths.len())
                .map(|idx| row.get(idx).cloned().unwrap_or_else(|| "-".to_string()));
            self.lines.push(format_row(cells, &widths));
        }
    }

    /// Lay the collected lines out on pages and encode them.
    #[must_use]
    pub fn finish(self) -> Vec<u8> {
        self.into_pages()
            .join(&PAGE_BREAK.to_string())
            .into_bytes()
    }

    /// Each page as a string, without separators.
    #[must_use]
    pub fn into_pages(self) -> Vec<String> {
        let per_page = self.layout.body_lines();
        let mut bodies: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();

        for line in self.lines {
            if current.len() == per_page {
                bodies.push(std::mem::take(&mut current));
            }
            if current.is_empty() && line.is_empty() {
                continue;
            }
            current.push(line);
        }
        if !current.is_empty() || bodies.is_empty() {
            bodies.push(current);
        }

        let total = bodies.len();
        let width = self.layout.width;
        let title = truncate(&self.title, width);
        bodies
            .into_iter()
            .enumerate()
            .map(|(idx, body)| {
                let mut page = Vec::with_capacity(self.layout.height);
                page.push(title.clone());
                page.push("=".repeat(width));
                page.extend(body);
                while page.len() < self.layout.height - 1 {
                    page.push(String::new());
                }
                page.push(pad_left(&format!("Page {} of {total}", idx + 1), width));
                let mut text = page.join("\n");
                text.push('\n');
                text
            })
            .collect()
    }
}

fn format_row(cells: impl Iterator<Item = String>, widths: &[usize]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| {
            let cell = truncate(&cell, *width);
            if is_numeric(&cell) {
                pad_left(&cell, *width)
            } else {
                pad(&cell, *width)
            }
        })
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.' | ',' | '%'))
}
