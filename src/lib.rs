pub mod cli;
pub mod config;
pub mod dates;
pub mod error;
pub mod fasta;
pub mod fs_util;
pub mod genbank;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod runner;
