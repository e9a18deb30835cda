//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::aggregate::FailurePolicy;
use crate::worker::invoker::DEFAULT_EXECUTABLE;

/// Read a FASTA file and run hhsearch on every entry, several entries in
/// parallel, against all databases found in the database directory.
#[derive(Debug, Clone, Parser)]
#[command(name = "hhrun", version)]
pub struct Cli {
    /// Peptide sequences in FASTA format ("-" or "stdin" reads standard input; ".gz", ".bz2" and ".zip" are decompressed)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Directory containing the hhsearch executable
    #[arg(long = "hh", value_name = "PATH", env = "HHRUN_HH_DIR", default_value = "~/temp/hhsuite/bin")]
    pub hh: PathBuf,

    /// Directory containing the *_hhm_db databases
    #[arg(long = "db", value_name = "PATH", env = "HHRUN_DB_DIR", default_value = "~/temp/hhsuite/db")]
    pub db: PathBuf,

    /// Output file ("-" or "stdout" for standard output, ".gz" is compressed) [default: stdout]
    #[arg(short = 'o', long = "out", value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Number of top matches to report per sequence
    #[arg(short = 'n', long = "number", value_name = "INT", default_value_t = 10)]
    pub number: usize,

    /// Number of concurrent hhsearch processes
    #[arg(short = 'p', long = "processes", value_name = "INT", default_value_t = 1)]
    pub processes: usize,

    /// Print runtime and average time per job to stderr
    #[arg(short = 't', long = "time")]
    pub time: bool,

    /// Turn the progress bar off
    #[arg(long = "noprogress")]
    pub noprogress: bool,

    /// Name of the executable inside the hh directory
    #[arg(long, value_name = "NAME", default_value = DEFAULT_EXECUTABLE)]
    pub executable: String,

    /// Directory for per-job scratch files [default: current directory]
    #[arg(long = "tmp-dir", value_name = "PATH", env = "HHRUN_TMP_DIR")]
    pub tmp_dir: Option<PathBuf>,

    /// Kill an hhsearch process after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// How failed jobs appear in the output: "empty" or "marker"
    #[arg(long = "on-error", value_name = "POLICY", default_value = "empty")]
    pub on_error: FailurePolicy,
}
