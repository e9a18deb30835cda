//! FASTA input: source selection, record parsing and job construction.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use zip::ZipArchive;

use crate::config::RunConfig;
use crate::error::InputError;
use crate::worker::{BatchId, Job};

/// One FASTA entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    /// Header line without the leading `>`.
    pub description: String,
    /// Sequence lines joined without separators.
    pub sequence: String,
}

impl FastaRecord {
    /// Text handed to the tool for this record.
    pub fn payload(&self) -> String {
        format!(">{}\n{}", self.description, self.sequence)
    }
}

/// `-` and `stdin` read standard input.
pub fn is_stdin(path: &Path) -> bool {
    matches!(path.to_str(), Some("-") | Some("stdin"))
}

/// Open the input for reading.
///
/// `.gz` and `.bz2` files are decompressed as a stream. For `.zip` archives
/// the first entry is read.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead + Send>, InputError> {
    if is_stdin(path) {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }

    let file = File::open(path).map_err(|source| InputError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("gz") => {
            tracing::debug!(path = %path.display(), "Reading gzip-compressed input");
            Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
        }
        Some("bz2") => {
            tracing::debug!(path = %path.display(), "Reading bzip2-compressed input");
            Ok(Box::new(BufReader::new(MultiBzDecoder::new(file))))
        }
        Some("zip") => read_first_zip_entry(path, file),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

fn read_first_zip_entry(path: &Path, file: File) -> Result<Box<dyn BufRead + Send>, InputError> {
    let archive_error = |reason: String| InputError::Archive {
        path: path.to_path_buf(),
        reason,
    };

    let mut archive = ZipArchive::new(file).map_err(|e| archive_error(e.to_string()))?;
    if archive.len() > 1 {
        tracing::warn!(
            path = %path.display(),
            entries = archive.len(),
            "Zip archive has several entries, reading only the first"
        );
    }
    let mut entry = archive
        .by_index(0)
        .map_err(|e| archive_error(e.to_string()))?;
    tracing::debug!(path = %path.display(), entry = entry.name(), "Reading zip entry");

    let mut contents = Vec::new();
    entry.read_to_end(&mut contents)?;
    Ok(Box::new(Cursor::new(contents)))
}

/// Streaming FASTA parser.
///
/// Sequence lines are trimmed and concatenated; blank lines are skipped.
/// A header without sequence lines yields an empty sequence.
pub struct FastaReader<R> {
    reader: R,
    line_no: usize,
    pending_header: Option<String>,
    done: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            pending_header: None,
            done: false,
        }
    }

    fn next_record(&mut self) -> Result<Option<FastaRecord>, InputError> {
        let mut sequence = String::new();
        let mut line = String::new();

        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                self.done = true;
                return Ok(self.pending_header.take().map(|description| FastaRecord {
                    description,
                    sequence,
                }));
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(header) = trimmed.strip_prefix('>') {
                let header = header.trim().to_string();
                match self.pending_header.replace(header) {
                    Some(description) => {
                        return Ok(Some(FastaRecord {
                            description,
                            sequence,
                        }));
                    }
                    None => continue,
                }
            }

            if self.pending_header.is_none() {
                return Err(InputError::Malformed {
                    line: self.line_no,
                    reason: "sequence data before the first '>' header".to_string(),
                });
            }
            sequence.push_str(trimmed);
        }
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = Result<FastaRecord, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Turn parsed records into jobs numbered from 1 in input order.
pub fn build_jobs<I>(
    records: I,
    config: &RunConfig,
    batch_id: BatchId,
) -> Result<Vec<Job>, InputError>
where
    I: IntoIterator<Item = Result<FastaRecord, InputError>>,
{
    let mut jobs = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let record = record?;
        jobs.push(Job {
            sequence: index as u64 + 1,
            payload: record.payload(),
            database_paths: config.databases.clone(),
            tool_path: config.tool_dir.clone(),
            batch_id,
        });
    }
    tracing::debug!(jobs = jobs.len(), "Built jobs from input");
    Ok(jobs)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::path::PathBuf;

    use bzip2::write::BzEncoder;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn parse(text: &str) -> Vec<Result<FastaRecord, InputError>> {
        FastaReader::new(Cursor::new(text.as_bytes().to_vec())).collect()
    }

    fn records(text: &str) -> Vec<FastaRecord> {
        parse(text).into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn parses_single_line_records() {
        let recs = records(">sp|P1 first\nMKVLA\n>sp|P2 second\nGGHTT\n");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].description, "sp|P1 first");
        assert_eq!(recs[0].sequence, "MKVLA");
        assert_eq!(recs[1].payload(), ">sp|P2 second\nGGHTT");
    }

    #[test]
    fn joins_multi_line_sequences_and_skips_blank_lines() {
        let recs = records("\n>a\nMKV\n  LAG \n\n>b\r\nTT\r\nPP\n\n");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].sequence, "MKVLAG");
        assert_eq!(recs[1].description, "b");
        assert_eq!(recs[1].sequence, "TTPP");
    }

    #[test]
    fn header_without_sequence_is_kept() {
        let recs = records(">empty\n>full\nMK");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].sequence, "");
        assert_eq!(recs[1].sequence, "MK");
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n  \n").is_empty());
    }

    #[test]
    fn sequence_before_header_is_malformed() {
        let out = parse("MKV\n>a\nLL\n");
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(InputError::Malformed { line: 1, .. })));
    }

    #[test]
    fn reads_gzip_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.fa.gz");
        let mut enc = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
        enc.write_all(b">x\nMKV\n>y\nLLA\n").unwrap();
        enc.finish().unwrap();

        let recs: Vec<_> = FastaReader::new(open_input(&path).unwrap())
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].sequence, "LLA");
    }

    #[test]
    fn reads_bzip2_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.fa.bz2");
        let mut enc = BzEncoder::new(std::fs::File::create(&path).unwrap(), bzip2::Compression::default());
        enc.write_all(b">x\nMKV\nLL\n>y\nGGA\n").unwrap();
        enc.finish().unwrap();

        let recs: Vec<_> = FastaReader::new(open_input(&path).unwrap())
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].sequence, "MKVLL");
        assert_eq!(recs[1].payload(), ">y\nGGA");
    }

    #[test]
    fn reads_first_zip_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.zip");
        let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
        zip.start_file("seqs.fa", SimpleFileOptions::default()).unwrap();
        zip.write_all(b">x\nMKV\n>y\nLLA\n").unwrap();
        zip.start_file("other.fa", SimpleFileOptions::default()).unwrap();
        zip.write_all(b">ignored\nAAA\n").unwrap();
        zip.finish().unwrap();

        let recs: Vec<_> = FastaReader::new(open_input(&path).unwrap())
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].description, "x");
        assert_eq!(recs[1].sequence, "LLA");
    }

    #[test]
    fn broken_zip_is_an_archive_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seqs.zip");
        std::fs::write(&path, b"not a zip archive").unwrap();

        let err = open_input(&path).err().unwrap();
        assert!(matches!(err, InputError::Archive { .. }));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = open_input(Path::new("/nonexistent/input.fa")).err().unwrap();
        assert!(matches!(err, InputError::Open { ref path, .. } if path == Path::new("/nonexistent/input.fa")));
    }

    #[test]
    fn stdin_aliases() {
        assert!(is_stdin(Path::new("-")));
        assert!(is_stdin(Path::new("stdin")));
        assert!(!is_stdin(Path::new("stdin.fa")));
    }

    #[test]
    fn build_jobs_numbers_from_one() {
        let config = RunConfig::for_databases(
            PathBuf::from("/opt/hh/bin"),
            vec![PathBuf::from("/db/a_hhm_db"), PathBuf::from("/db/b_hhm_db")],
        );
        let batch = BatchId::new();
        let jobs = build_jobs(parse(">a\nMK\n>b\nVL\n>c\nAA\n"), &config, batch).unwrap();

        assert_eq!(jobs.iter().map(|j| j.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(jobs[1].payload, ">b\nVL");
        assert_eq!(jobs[2].database_paths.len(), 2);
        assert_eq!(jobs[0].tool_path, PathBuf::from("/opt/hh/bin"));
        assert!(jobs.iter().all(|j| j.batch_id == batch));
    }

    #[test]
    fn build_jobs_stops_at_malformed_input() {
        let config = RunConfig::for_databases(PathBuf::from("/bin"), vec![PathBuf::from("/db/a_hhm_db")]);
        let err = build_jobs(parse("junk\n"), &config, BatchId::new()).unwrap_err();
        assert!(matches!(err, InputError::Malformed { .. }));
    }
}
