//! Ordered result aggregation.
//!
//! Completions arrive in finishing order; blocks are written in submission
//! order. Anything ahead of the next expected sequence waits in a buffer.
//!
//! Block format per job:
//!
//! ```text
//! <payload>
//! --
//! <label>
//! <body>
//! ...          (at most top_n label/body pairs)
//! #
//! ```

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::str::FromStr;

use crate::worker::{Completion, JobState};

/// How a failed job renders its result section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Empty result section, indistinguishable from a job without hits.
    #[default]
    Empty,
    /// One `!error<TAB>message` line before the closing marker.
    Marker,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "marker" => Ok(Self::Marker),
            other => Err(format!("unknown failure policy '{other}' (expected empty or marker)")),
        }
    }
}

/// Counts of what was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub blocks: usize,
    pub records: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// Writes completion blocks to `sink` in ascending sequence order.
pub struct Aggregator<W: Write> {
    sink: W,
    top_n: usize,
    policy: FailurePolicy,
    next_sequence: u64,
    pending: BTreeMap<u64, Completion>,
    summary: AggregateSummary,
}

impl<W: Write> Aggregator<W> {
    pub fn new(sink: W, top_n: usize, policy: FailurePolicy) -> Self {
        Self {
            sink,
            top_n,
            policy,
            next_sequence: 1,
            pending: BTreeMap::new(),
            summary: AggregateSummary::default(),
        }
    }

    /// Number of completions waiting for an earlier sequence.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Accept one completion and write every block that is now in order.
    pub fn push(&mut self, completion: Completion) -> io::Result<()> {
        let sequence = completion.sequence();
        if sequence < self.next_sequence || self.pending.contains_key(&sequence) {
            tracing::warn!(job = sequence, "Duplicate completion ignored");
            return Ok(());
        }
        self.pending.insert(sequence, completion);

        while let Some(completion) = self.pending.remove(&self.next_sequence) {
            self.write_block(&completion)?;
            self.next_sequence += 1;
        }
        Ok(())
    }

    /// Write whatever is still buffered, in ascending order, and flush.
    ///
    /// Leftovers only exist if some sequence never arrived.
    pub fn finish(mut self) -> io::Result<(AggregateSummary, W)> {
        if !self.pending.is_empty() {
            tracing::warn!(
                missing_from = self.next_sequence,
                buffered = self.pending.len(),
                "Sequence gap in completions; writing remaining blocks in order"
            );
        }
        let pending = std::mem::take(&mut self.pending);
        for completion in pending.into_values() {
            self.write_block(&completion)?;
        }
        self.sink.flush()?;
        Ok((self.summary, self.sink))
    }

    fn write_block(&mut self, completion: &Completion) -> io::Result<()> {
        write!(self.sink, "{}\n--\n", completion.job.payload)?;

        for record in completion.results.iter().take(self.top_n) {
            write!(self.sink, "{}\n{}\n", record.label, record.body)?;
            self.summary.records += 1;
        }

        match completion.state() {
            JobState::Failed => self.summary.failed += 1,
            JobState::Cancelled => self.summary.cancelled += 1,
            _ => {}
        }
        if let (FailurePolicy::Marker, Some(error)) = (self.policy, &completion.error) {
            let message = error.to_string().replace('\n', " ");
            writeln!(self.sink, "!error\t{message}")?;
        }

        self.sink.write_all(b"#\n")?;
        self.summary.blocks += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::error::{JobError, ToolError};
    use crate::worker::{BatchId, Job, ResultRecord};

    fn job(sequence: u64) -> Arc<Job> {
        Arc::new(Job {
            sequence,
            payload: format!(">q{sequence}\nMKV"),
            database_paths: vec![PathBuf::from("/db/a_hhm_db")],
            tool_path: PathBuf::from("/bin"),
            batch_id: BatchId::new(),
        })
    }

    fn ok(sequence: u64, hits: usize) -> Completion {
        let results = (1..=hits)
            .map(|i| ResultRecord::new(format!("hit{i}"), format!("Sum_probs={i}")))
            .collect();
        Completion::success(job(sequence), results)
    }

    fn failed(sequence: u64) -> Completion {
        Completion::failure(
            job(sequence),
            ToolError::NonZeroExit {
                code: Some(2),
                stderr: "db missing".to_string(),
            }
            .into(),
        )
    }

    fn render(completions: Vec<Completion>, top_n: usize, policy: FailurePolicy) -> String {
        let mut agg = Aggregator::new(Vec::new(), top_n, policy);
        for c in completions {
            agg.push(c).unwrap();
        }
        let (_, out) = agg.finish().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn writes_block_format() {
        let out = render(vec![ok(1, 2)], 10, FailurePolicy::Empty);
        assert_eq!(
            out,
            ">q1\nMKV\n--\nhit1\nSum_probs=1\nhit2\nSum_probs=2\n#\n"
        );
    }

    #[test]
    fn restores_submission_order() {
        let out = render(vec![ok(3, 1), ok(1, 1), ok(2, 1)], 1, FailurePolicy::Empty);
        let headers: Vec<&str> = out.lines().filter(|l| l.starts_with(">q")).collect();
        assert_eq!(headers, vec![">q1", ">q2", ">q3"]);
    }

    #[test]
    fn buffers_until_gap_is_filled() {
        let mut agg = Aggregator::new(Vec::new(), 5, FailurePolicy::Empty);
        agg.push(ok(2, 1)).unwrap();
        agg.push(ok(3, 1)).unwrap();
        assert_eq!(agg.buffered(), 2);
        agg.push(ok(1, 1)).unwrap();
        assert_eq!(agg.buffered(), 0);
        let (summary, _) = agg.finish().unwrap();
        assert_eq!(summary.blocks, 3);
    }

    #[test]
    fn truncates_to_top_n() {
        for (hits, top_n, expected) in [(5, 3, 3), (2, 3, 2), (3, 3, 3), (0, 3, 0), (4, 0, 0)] {
            let mut agg = Aggregator::new(Vec::new(), top_n, FailurePolicy::Empty);
            agg.push(ok(1, hits)).unwrap();
            let (summary, out) = agg.finish().unwrap();
            assert_eq!(summary.records, expected, "hits={hits} top_n={top_n}");
            let text = String::from_utf8(out).unwrap();
            assert_eq!(text.lines().count(), 4 + expected * 2);
            assert!(text.ends_with("#\n"));
        }
    }

    #[test]
    fn failed_job_renders_empty_section_by_default() {
        let out = render(vec![ok(1, 1), failed(2), ok(3, 1)], 1, FailurePolicy::Empty);
        assert!(out.contains(">q2\nMKV\n--\n#\n"));
        assert!(!out.contains("!error"));
    }

    #[test]
    fn marker_policy_names_the_error() {
        let mut agg = Aggregator::new(Vec::new(), 1, FailurePolicy::Marker);
        agg.push(failed(1)).unwrap();
        agg.push(Completion::failure(job(2), JobError::Cancelled)).unwrap();
        let (summary, out) = agg.finish().unwrap();
        let out = String::from_utf8(out).unwrap();

        assert!(out.contains(">q1\nMKV\n--\n!error\tTool exited with status 2: db missing\n#\n"));
        assert!(out.contains("!error\tJob cancelled before it started\n#\n"));
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.cancelled, 1);
    }

    #[test]
    fn finish_writes_leftovers_in_order() {
        let mut agg = Aggregator::new(Vec::new(), 1, FailurePolicy::Empty);
        agg.push(ok(4, 0)).unwrap();
        agg.push(ok(2, 0)).unwrap();
        let (summary, out) = agg.finish().unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, ">q2\nMKV\n--\n#\n>q4\nMKV\n--\n#\n");
        assert_eq!(summary.blocks, 2);
    }

    #[test]
    fn duplicate_completion_is_ignored() {
        let out = render(vec![ok(1, 1), ok(1, 1)], 1, FailurePolicy::Empty);
        assert_eq!(out.matches(">q1").count(), 1);
    }

    #[test]
    fn failure_policy_parses() {
        assert_eq!("empty".parse::<FailurePolicy>().unwrap(), FailurePolicy::Empty);
        assert_eq!("MARKER".parse::<FailurePolicy>().unwrap(), FailurePolicy::Marker);
        assert!("loud".parse::<FailurePolicy>().is_err());
    }
}
