pub mod config;
pub mod discover;
pub mod download;

pub use config::{ConfigCommands, ConfigReport};
pub use discover::{CandidateReport, DiscoverArgs};
pub use download::{write_stream, DownloadArgs, DownloadReport, KindArg};
