//! Paging counter parsing

use serde::Serialize;

/// Rows shown on the current page, 1-based and inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PagingCounts {
    pub first: u64,
    pub last: u64,
    pub total: u64,
}

impl PagingCounts {
    /// Parse text like `"1 - 20 of 1,042"`
    pub fn parse(text: &str) -> Option<Self> {
        let cleaned = text.replace(',', "");
        let (range, total) = cleaned.split_once(" of ")?;
        let (first, last) = range.split_once('-')?;

        Some(Self {
            first: first.trim().parse().ok()?,
            last: last.trim().parse().ok()?,
            total: total.trim().parse().ok()?,
        })
    }

    pub fn rows_on_page(&self) -> u64 {
        if self.last >= self.first {
            self.last - self.first + 1
        } else {
            0
        }
    }

    pub fn is_last_page(&self) -> bool {
        self.last >= self.total
    }
}
