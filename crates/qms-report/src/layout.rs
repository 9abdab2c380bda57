use crate::error::ReportError;

/// Narrowest page that still fits a label column and a value column.
pub const MIN_WIDTH: usize = 40;
/// Shortest page that still leaves room for a body between header and footer.
pub const MIN_HEIGHT: usize = 10;

/// Lines per page spent on the header (title, divider).
pub(crate) const HEADER_LINES: usize = 2;
/// Lines per page spent on the footer (blank, page number).
pub(crate) const FOOTER_LINES: usize = 2;

/// Page geometry in characters and lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    pub width: usize,
    pub height: usize,
}

impl Default for PageLayout {
    /// 80 columns by 60 lines, a typewriter page at 6 lines per inch.
    fn default() -> Self {
        Self {
            width: 80,
            height: 60,
        }
    }
}

impl PageLayout {
    #[must_use]
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// # Errors
    ///
    /// Returns `ReportError::InvalidLayout` when the page is too small.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.width < MIN_WIDTH {
            return Err(ReportError::InvalidLayout(format!(
                "width {} is below the minimum of {MIN_WIDTH}",
                self.width
            )));
        }
        if self.height < MIN_HEIGHT {
            return Err(ReportError::InvalidLayout(format!(
                "height {} is below the minimum of {MIN_HEIGHT}",
                self.height
            )));
        }
        Ok(())
    }

    /// Body lines available on each page.
    #[must_use]
    pub const fn body_lines(&self) -> usize {
        self.height.saturating_sub(HEADER_LINES + FOOTER_LINES)
    }
}
