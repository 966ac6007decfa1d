use crate::error::SplitError;
use crate::writer::BatchWriter;
use storage::ReadableLineSource;
use tracing::debug;

/// Residue characters in one line, excluding line terminators.
fn residue_len(line: &str) -> u64 {
    line.trim_end_matches(['\n', '\r']).len() as u64
}

/// Batch-boundary rule.
///
/// Strict enforces a hard per-batch ceiling. Proportional advances a
/// running threshold by one share per sealed batch and cuts whenever the
/// cumulative length processed so far would cross it, which lands close to
/// the target batch count even when record lengths are uneven.
#[derive(Debug, Clone, Copy)]
pub enum BatchBound {
    Strict { limit: u64 },
    Proportional { share: u64, threshold: u64 },
}

impl BatchBound {
    pub fn strict(limit: u64) -> Self {
        BatchBound::Strict { limit }
    }

    pub fn proportional(share: u64) -> Self {
        let share = share.max(1);
        BatchBound::Proportional {
            share,
            threshold: share,
        }
    }

    fn should_seal(&self, sealed_total: u64, batch_len: u64, record_len: u64) -> bool {
        match self {
            BatchBound::Strict { limit } => batch_len + record_len > *limit,
            BatchBound::Proportional { threshold, .. } => {
                sealed_total + batch_len + record_len > *threshold
            }
        }
    }

    fn advance(&mut self) {
        if let BatchBound::Proportional { share, threshold } = self {
            *threshold += *share;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    /// Grand total of residues across all sealed batches.
    pub total_length: u64,
    /// Fully-qualified batch names in seal order.
    pub batches: Vec<String>,
}

/// Streams a sequence collection and cuts it into sealed batches without
/// ever splitting a record. Records longer than the bound get a batch of
/// their own.
///
/// Feed any number of sources through [`consume`](Self::consume); a record
/// may continue across a source boundary, so the collection reads as one
/// logical concatenation. [`finish`](Self::finish) flushes whatever is
/// buffered and returns the summary.
pub struct SequenceBatcher<'a, 'b> {
    writer: &'b mut BatchWriter<'a>,
    bound: BatchBound,
    record_lines: Vec<String>,
    record_len: u64,
    batch_lines: Vec<String>,
    batch_len: u64,
    sealed_total: u64,
    lines_seen: u64,
}

impl<'a, 'b> SequenceBatcher<'a, 'b> {
    pub fn new(writer: &'b mut BatchWriter<'a>, bound: BatchBound) -> Self {
        SequenceBatcher {
            writer,
            bound,
            record_lines: Vec::new(),
            record_len: 0,
            batch_lines: Vec::new(),
            batch_len: 0,
            sealed_total: 0,
            lines_seen: 0,
        }
    }

    /// Drain one source. The pending record is carried over to the next
    /// call, so sharded inputs keep record continuity.
    pub fn consume(&mut self, source: &mut dyn ReadableLineSource) -> Result<(), SplitError> {
        while let Some(line) = source.next_line()? {
            self.lines_seen += 1;
            if line.starts_with('>') {
                self.flush_record()?;
            } else {
                self.record_len += residue_len(&line);
            }
            self.record_lines.push(line);
        }
        // Keep batch files well-formed regardless of how the source ended.
        if let Some(last) = self.record_lines.last_mut() {
            if !last.ends_with('\n') {
                last.push('\n');
            }
        }
        Ok(())
    }

    /// Flush any buffered record and batch, then report totals. Zero lines
    /// across all consumed sources is an `EmptyInput` error.
    pub fn finish(mut self) -> Result<SplitSummary, SplitError> {
        self.flush_record()?;
        self.seal_batch()?;
        if self.lines_seen == 0 {
            return Err(SplitError::EmptyInput);
        }
        debug!(
            total_length = self.sealed_total,
            batches = self.writer.manifest().len(),
            "Split complete"
        );
        Ok(SplitSummary {
            total_length: self.sealed_total,
            batches: self.writer.manifest().to_vec(),
        })
    }

    /// Move the pending record into the current batch, sealing first if the
    /// bound says the record no longer fits.
    fn flush_record(&mut self) -> Result<(), SplitError> {
        if self
            .bound
            .should_seal(self.sealed_total, self.batch_len, self.record_len)
        {
            self.seal_batch()?;
            self.bound.advance();
        }
        self.batch_lines.append(&mut self.record_lines);
        self.batch_len += self.record_len;
        self.record_len = 0;
        Ok(())
    }

    fn seal_batch(&mut self) -> Result<(), SplitError> {
        if self.batch_lines.is_empty() {
            return Ok(());
        }
        self.writer.seal(&self.batch_lines)?;
        self.batch_lines.clear();
        self.sealed_total += self.batch_len;
        self.batch_len = 0;
        Ok(())
    }
}

/// Full pre-pass for proportional mode: walk every line and count residues
/// without writing anything.
pub fn measure(sources: &mut [Box<dyn ReadableLineSource>]) -> Result<u64, SplitError> {
    let mut total = 0u64;
    let mut lines_seen = 0u64;
    for source in sources {
        while let Some(line) = source.next_line()? {
            lines_seen += 1;
            if !line.starts_with('>') {
                total += residue_len(&line);
            }
        }
    }
    if lines_seen == 0 {
        return Err(SplitError::EmptyInput);
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::line_source::BufferedLineSource;
    use storage::{SourceLocation, StagingArea};
    use std::io::Cursor;

    fn source(text: &str) -> BufferedLineSource<Cursor<Vec<u8>>> {
        BufferedLineSource::new(Cursor::new(text.as_bytes().to_vec()))
    }

    fn run_split(
        texts: &[&str],
        bound: BatchBound,
        out_dir: &str,
    ) -> Result<SplitSummary, SplitError> {
        let mut staging = StagingArea::new().unwrap();
        let mut writer = BatchWriter::new(&mut staging, out_dir);
        let mut batcher = SequenceBatcher::new(&mut writer, bound);
        for text in texts {
            let mut src = source(text);
            batcher.consume(&mut src)?;
        }
        batcher.finish()
    }

    fn record(header: &str, residues: usize) -> String {
        format!(">{header}\n{}\n", "A".repeat(residues))
    }

    #[test]
    fn test_strict_never_exceeds_bound_at_record_granularity() {
        // Three records of 2,000,000 residues with a 3,000,000 bound: the
        // second record would push batch 0 to 4,000,000, so each record
        // lands in its own batch.
        let dir = tempfile::tempdir().unwrap();
        let input = format!(
            "{}{}{}",
            record("r1", 2_000_000),
            record("r2", 2_000_000),
            record("r3", 2_000_000)
        );
        let summary = run_split(
            &[&input],
            BatchBound::strict(3_000_000),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(summary.batches.len(), 3);
        assert_eq!(summary.total_length, 6_000_000);
        for batch in &summary.batches {
            let content = std::fs::read_to_string(batch).unwrap();
            let residues: usize = content
                .lines()
                .filter(|l| !l.starts_with('>'))
                .map(|l| l.len())
                .sum();
            assert!(residues <= 3_000_000);
        }
    }

    #[test]
    fn test_conservation_across_batches() {
        let dir = tempfile::tempdir().unwrap();
        let input: String = (0..40)
            .map(|i| record(&format!("r{i}"), 17 + i * 13))
            .collect();
        let expected: u64 = (0..40).map(|i| 17 + i as u64 * 13).sum();

        let summary = run_split(
            &[&input],
            BatchBound::strict(100),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(summary.total_length, expected);

        // Independent full scan over the written batches.
        let mut rescanned = 0u64;
        for batch in &summary.batches {
            let content = std::fs::read_to_string(batch).unwrap();
            rescanned += content
                .lines()
                .filter(|l| !l.starts_with('>'))
                .map(|l| l.len() as u64)
                .sum::<u64>();
        }
        assert_eq!(rescanned, expected);
    }

    #[test]
    fn test_no_record_is_split_across_batches() {
        let dir = tempfile::tempdir().unwrap();
        let input: String = (0..10)
            .map(|i| format!(">r{i}\nACGTACGT\nACGT\n"))
            .collect();
        let summary = run_split(
            &[&input],
            BatchBound::strict(20),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        for batch in &summary.batches {
            let content = std::fs::read_to_string(batch).unwrap();
            // Every record in a batch file must be complete: a header
            // followed by both residue lines.
            for (i, line) in content.lines().enumerate() {
                if line.starts_with('>') {
                    let lines: Vec<&str> = content.lines().collect();
                    assert_eq!(lines.get(i + 1).copied().map(|l| l.len()), Some(8));
                    assert_eq!(lines.get(i + 2).copied().map(|l| l.len()), Some(4));
                }
            }
        }
    }

    #[test]
    fn test_record_continues_across_source_boundary() {
        let dir = tempfile::tempdir().unwrap();
        // The second source starts with residues, not a header: they belong
        // to the record opened in the first source.
        let summary = run_split(
            &[">r1\nAAAA", "CCCC\n>r2\nGGGG\n"],
            BatchBound::strict(1_000),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(summary.batches.len(), 1);
        let content = std::fs::read_to_string(&summary.batches[0]).unwrap();
        assert_eq!(content, ">r1\nAAAA\nCCCC\n>r2\nGGGG\n");
        assert_eq!(summary.total_length, 12);
    }

    #[test]
    fn test_trailing_line_without_terminator_is_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run_split(
            &[">r1\nACGT"],
            BatchBound::strict(1_000),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        let content = std::fs::read_to_string(&summary.batches[0]).unwrap();
        assert_eq!(content, ">r1\nACGT\n");
        assert_eq!(summary.total_length, 4);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        match run_split(&[], BatchBound::strict(100), dir.path().to_str().unwrap()) {
            Err(SplitError::EmptyInput) => {}
            other => panic!("expected empty input error, got {other:?}"),
        }
        match run_split(&[""], BatchBound::strict(100), dir.path().to_str().unwrap()) {
            Err(SplitError::EmptyInput) => {}
            other => panic!("expected empty input error, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_record_gets_its_own_batch() {
        let dir = tempfile::tempdir().unwrap();
        let input = format!(
            "{}{}{}",
            record("small1", 10),
            record("huge", 5_000),
            record("small2", 10)
        );
        let summary = run_split(
            &[&input],
            BatchBound::strict(100),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(summary.batches.len(), 3);
        let huge = std::fs::read_to_string(&summary.batches[1]).unwrap();
        assert!(huge.starts_with(">huge\n"));
    }

    #[test]
    fn test_proportional_mode_hits_target_count() {
        let dir = tempfile::tempdir().unwrap();
        // 200 records of 50 residues each: total 10,000. Target 8 parts
        // gives a share of 1,250.
        let input: String = (0..200).map(|i| record(&format!("r{i}"), 50)).collect();
        let total = 10_000u64;
        let parts = 8u64;
        let share = total / parts;
        let summary = run_split(
            &[&input],
            BatchBound::proportional(share),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(summary.total_length, total);
        let produced = summary.batches.len() as u64;
        assert!(
            produced >= parts - 1 && produced <= parts + 1,
            "expected about {parts} batches, produced {produced}"
        );
    }

    #[test]
    fn test_proportional_threshold_absorbs_uneven_records() {
        let dir = tempfile::tempdir().unwrap();
        // Alternating 10 and 90 residue records; a strict bound of 100
        // would drift, the cumulative threshold must not.
        let input: String = (0..100)
            .map(|i| record(&format!("r{i}"), if i % 2 == 0 { 10 } else { 90 }))
            .collect();
        let total = 50 * 10 + 50 * 90; // 5,000
        let parts = 10u64;
        let summary = run_split(
            &[&input],
            BatchBound::proportional(total / parts),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        let produced = summary.batches.len() as u64;
        assert!(
            produced >= parts - 1 && produced <= parts + 1,
            "expected about {parts} batches, produced {produced}"
        );
    }

    #[test]
    fn test_manifest_matches_written_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let input: String = (0..12).map(|i| record(&format!("r{i}"), 30)).collect();
        let summary = run_split(
            &[&input],
            BatchBound::strict(60),
            dir.path().to_str().unwrap(),
        )
        .unwrap();
        assert_eq!(summary.batches.len(), 6);
        for (i, fqn) in summary.batches.iter().enumerate() {
            assert!(fqn.ends_with(&model::paths::batch_file_name(i)));
            assert!(std::fs::metadata(fqn).is_ok(), "missing batch file {fqn}");
        }
        // No extra files beyond the manifest.
        let written = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(written, summary.batches.len());
    }

    #[test]
    fn test_measure_counts_residues_only() {
        let mut sources: Vec<Box<dyn ReadableLineSource>> = vec![
            Box::new(source(">r1\nACGT\nAC\n")),
            Box::new(source(">r2\nGG")),
        ];
        assert_eq!(measure(&mut sources).unwrap(), 8);

        let mut empty: Vec<Box<dyn ReadableLineSource>> = vec![Box::new(source(""))];
        match measure(&mut empty) {
            Err(SplitError::EmptyInput) => {}
            other => panic!("expected empty input error, got {other:?}"),
        }
    }

    #[test]
    fn test_archive_and_plain_split_identically() {
        let part1 = ">s1\nAAAACCCC\n>s2\nGGGG\n";
        let part2 = ">s3\nTTTTTTTT\n";

        // Plain: both parts concatenated in one stream.
        let plain_dir = tempfile::tempdir().unwrap();
        let plain = format!("{part1}{part2}");
        let plain_summary = run_split(
            &[&plain],
            BatchBound::strict(12),
            plain_dir.path().to_str().unwrap(),
        )
        .unwrap();

        // Archive: the same content split across two members.
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in [("part1.fa", part1), ("part2.fa", part2)] {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder
                .append_data(&mut header, name, Cursor::new(data.as_bytes()))
                .unwrap();
        }
        let tar_dir = tempfile::tempdir().unwrap();
        let tar_path = tar_dir.path().join("in.tar");
        std::fs::write(&tar_path, builder.into_inner().unwrap()).unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let loc = SourceLocation::resolve(tar_path.to_str().unwrap());
        let mut src = storage::open_line_source(&loc, &storage::RemoteConfig::default()).unwrap();
        let mut staging = StagingArea::new().unwrap();
        let mut writer = BatchWriter::new(&mut staging, out_dir.path().to_str().unwrap());
        let mut batcher = SequenceBatcher::new(&mut writer, BatchBound::strict(12));
        batcher.consume(src.as_mut()).unwrap();
        let tar_summary = batcher.finish().unwrap();

        assert_eq!(tar_summary.total_length, plain_summary.total_length);
        assert_eq!(tar_summary.batches.len(), plain_summary.batches.len());
        for (a, b) in tar_summary.batches.iter().zip(plain_summary.batches.iter()) {
            assert_eq!(
                std::fs::read_to_string(a).unwrap(),
                std::fs::read_to_string(b).unwrap()
            );
        }
    }
}
