//! Scrapes hits out of raw tool output.
//!
//! A hit is a `>label` line followed by a line carrying the summary marker
//! (`Sum_probs=` for hhsearch). Anything else is skipped; this is a
//! best-effort scraper, not a validating parser.

use std::sync::LazyLock;

use regex::Regex;

use crate::worker::job::ResultRecord;

/// Summary statistic closing every hit in hhsearch output.
pub const DEFAULT_MARKER: &str = "Sum_probs=";

static DEFAULT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&hit_pattern(DEFAULT_MARKER)).unwrap()
});

fn hit_pattern(marker: &str) -> String {
    // `.` never matches a newline, so each group is confined to one line.
    format!(r">(.+?)\n(.+{}.+?)\n", regex::escape(marker))
}

/// Turns raw tool output into an ordered list of [`ResultRecord`]s.
#[derive(Debug, Clone)]
pub struct ResultExtractor {
    pattern: Regex,
}

impl ResultExtractor {
    pub fn new() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
        }
    }

    /// Use another literal summary marker.
    pub fn with_marker(marker: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&hit_pattern(marker))?,
        })
    }

    /// Matches in first-to-last textual order. The tool's own ranking is kept.
    pub fn extract(&self, raw: &str) -> Vec<ResultRecord> {
        self.pattern
            .captures_iter(raw)
            .map(|caps| ResultRecord::new(&caps[1], &caps[2]))
            .collect()
    }
}

impl Default for ResultExtractor {
    fn default() -> Self {
        Self::new()
    }
}
