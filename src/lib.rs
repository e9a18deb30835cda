//! hhrun: run hhsearch over every entry of a FASTA file on a bounded pool of
//! concurrent processes and collect the top hits in input order.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod worker;
