//! Download collaborator: fetches a song's audio and transcodes it.
//!
//! The `Downloader` trait is blocking. The download pool runs it
//! on tokio's blocking threads, so implementations are free to shell out,
//! wait on child processes or do synchronous I/O.
//!
//! # Example
//!
//! ```ignore
//! use tunefetch_core::downloader::{CommandDownloader, Downloader};
//! use tunefetch_core::settings::Settings;
//!
//! let downloader = CommandDownloader::new();
//! let path = downloader.download(&song, &Settings::default())?;
//! ```

mod command;
mod error;
mod traits;

pub use command::CommandDownloader;
pub use error::DownloadError;
pub use traits::Downloader;
