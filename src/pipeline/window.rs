//! Sliding windows: split a document's pages into overlapping ranges.
//!
//! A lease clause that starts at the bottom of page 7 and ends on page 8
//! would be cut in half by disjoint chunks. Overlapping windows give every
//! page boundary at least one window that sees both sides; the merge step
//! de-duplicates whatever the overlap extracts twice.
//!
//! ```text
//! size 7, overlap 2, 15 pages
//! [0 ........ 7)
//!           [5 ........ 12)
//!                     [10 ... 15)
//! ```

use serde::{Deserialize, Serialize};

/// One window: pages `[start, end)`, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub window_id: usize,
    pub start: usize,
    pub end: usize,
}

/// Position of a window inside the document, as shown to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowContext {
    pub window_id: usize,
    /// 1-based, inclusive.
    pub start_page: usize,
    /// 1-based, inclusive.
    pub end_page: usize,
    pub total_pages: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl PageWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn context(&self, total_pages: usize) -> WindowContext {
        WindowContext {
            window_id: self.window_id,
            start_page: self.start + 1,
            end_page: self.end,
            total_pages,
            is_first: self.window_id == 0,
            is_last: self.end >= total_pages,
        }
    }
}

impl WindowContext {
    /// One sentence telling the model which part of the lease it is reading.
    pub fn description(&self) -> String {
        let span = format!(
            "pages {}-{} of {}",
            self.start_page, self.end_page, self.total_pages
        );
        match (self.is_first, self.is_last) {
            (true, true) => format!("This is the COMPLETE lease document ({span})."),
            (true, false) => format!(
                "This is the FIRST section of the lease ({span}). \
                 Later sections will be processed separately."
            ),
            (false, true) => format!(
                "This is the FINAL section of the lease ({span}). \
                 Earlier sections were processed separately."
            ),
            (false, false) => format!(
                "This is a MIDDLE section of the lease ({span}). \
                 Other sections are processed separately."
            ),
        }
    }
}

/// Plan overlapping windows covering `total_pages`.
///
/// Every page lands in at least one window; consecutive windows share
/// `overlap` pages. `overlap` must be smaller than `size` (the config
/// builder guarantees it).
pub fn plan_windows(total_pages: usize, size: usize, overlap: usize) -> Vec<PageWindow> {
    let step = size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < total_pages {
        let end = (start + size).min(total_pages);
        windows.push(PageWindow {
            window_id: windows.len(),
            start,
            end,
        });
        if end >= total_pages {
            break;
        }
        start += step;
    }
    windows
}

/// Render the pages of `window` as the document text sent to the model.
pub fn window_text(pages: &[String], window: &PageWindow) -> String {
    pages[window.start..window.end.min(pages.len())]
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let page_num = window.start + i + 1;
            let body = if text.trim().is_empty() {
                format!("[Empty page {page_num}]")
            } else {
                text.trim().to_string()
            };
            format!("=== PAGE {page_num} ===\n{body}")
        })
        .collect::<Vec<_>>()
        .join("\n\n--- PAGE BREAK ---\n\n")
}

/// Page and window counts reported with every extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total_pages: usize,
    pub total_windows: usize,
    pub window_size: usize,
    pub overlap: usize,
    pub avg_chars_per_page: f64,
    pub ocr_applied: bool,
}

/// Average trimmed characters per page; 0 for an empty document.
pub fn avg_chars_per_page(pages: &[String]) -> f64 {
    if pages.is_empty() {
        return 0.0;
    }
    let total: usize = pages.iter().map(|p| p.trim().chars().count()).sum();
    total as f64 / pages.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(w: &[PageWindow]) -> Vec<(usize, usize)> {
        w.iter().map(|w| (w.start, w.end)).collect()
    }

    #[test]
    fn plan_fifteen_pages_default_geometry() {
        let w = plan_windows(15, 7, 2);
        assert_eq!(spans(&w), vec![(0, 7), (5, 12), (10, 15)]);
        assert_eq!(w[2].window_id, 2);
    }

    #[test]
    fn short_document_is_one_window() {
        assert_eq!(spans(&plan_windows(4, 7, 2)), vec![(0, 4)]);
        assert_eq!(spans(&plan_windows(7, 7, 2)), vec![(0, 7)]);
    }

    #[test]
    fn no_pages_no_windows() {
        assert!(plan_windows(0, 7, 2).is_empty());
    }

    #[test]
    fn window_plan_covers_every_page() {
        for total in 1..60 {
            for size in 3..=15 {
                for overlap in 1..=5.min(size - 1) {
                    let w = plan_windows(total, size, overlap);
                    assert_eq!(w.first().unwrap().start, 0);
                    assert_eq!(w.last().unwrap().end, total);
                    for pair in w.windows(2) {
                        assert_eq!(pair[0].end - pair[1].start, overlap.min(pair[0].len()));
                    }
                }
            }
        }
    }

    #[test]
    fn context_flags_and_descriptions() {
        let w = plan_windows(15, 7, 2);
        let first = w[0].context(15);
        assert!(first.is_first && !first.is_last);
        assert_eq!((first.start_page, first.end_page), (1, 7));
        assert!(first.description().contains("FIRST section"));

        let middle = w[1].context(15);
        assert!(middle.description().contains("MIDDLE section (pages 6-12 of 15)"));

        let last = w[2].context(15);
        assert!(last.is_last);
        assert!(last.description().contains("FINAL"));

        let only = plan_windows(3, 7, 2)[0].context(3);
        assert!(only.description().contains("COMPLETE"));
    }

    #[test]
    fn window_text_marks_pages_and_blanks() {
        let pages = vec!["Rent is $1,000".to_string(), "   ".to_string(), "Deposit".to_string()];
        let text = window_text(&pages, &PageWindow { window_id: 0, start: 0, end: 3 });
        assert_eq!(
            text,
            "=== PAGE 1 ===\nRent is $1,000\n\n--- PAGE BREAK ---\n\n\
             === PAGE 2 ===\n[Empty page 2]\n\n--- PAGE BREAK ---\n\n\
             === PAGE 3 ===\nDeposit"
        );
    }

    #[test]
    fn avg_chars_uses_trimmed_text() {
        let pages = vec!["  abcd  ".to_string(), "ab".to_string()];
        assert_eq!(avg_chars_per_page(&pages), 3.0);
        assert_eq!(avg_chars_per_page(&[]), 0.0);
    }
}
