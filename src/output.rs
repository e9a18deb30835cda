//! Output sink selection.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;

/// Where aggregated blocks go.
pub enum OutputSink {
    Stdout(BufWriter<io::Stdout>),
    File(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputSink {
    /// `None`, `-` and `stdout` select standard output; `*.gz` is
    /// gzip-compressed; anything else is a plain file, truncated.
    pub fn open(path: Option<&Path>) -> io::Result<Self> {
        let Some(path) = path.filter(|p| !is_stdout(p)) else {
            return Ok(Self::Stdout(BufWriter::new(io::stdout())));
        };

        let file = BufWriter::new(File::create(path)?);
        if path.extension().is_some_and(|ext| ext == "gz") {
            Ok(Self::Gzip(GzEncoder::new(file, Compression::default())))
        } else {
            Ok(Self::File(file))
        }
    }

    /// Flush everything and write the gzip trailer if there is one.
    pub fn finish(self) -> io::Result<()> {
        match self {
            Self::Stdout(mut w) => w.flush(),
            Self::File(mut w) => w.flush(),
            Self::Gzip(enc) => enc.finish()?.flush(),
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Stdout(w) => w.write(buf),
            Self::File(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

fn is_stdout(path: &Path) -> bool {
    matches!(path.to_str(), Some("-") | Some("stdout"))
}

/// Open an output path given on the command line.
pub fn open_output(path: Option<&PathBuf>) -> io::Result<OutputSink> {
    OutputSink::open(path.map(PathBuf::as_path))
}
