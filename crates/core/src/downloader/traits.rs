//! Trait definitions for the downloader module.

use std::path::PathBuf;

use super::error::DownloadError;
use crate::settings::Settings;
use crate::song::Song;

/// Fetches and transcodes a song. Blocking.
pub trait Downloader: Send + Sync {
    /// Returns the name of this downloader implementation.
    fn name(&self) -> &str;

    /// Downloads `song` according to `settings`.
    ///
    /// Returns the path of the produced file, or `None` when the download
    /// finished without producing a file (metadata-only outcome).
    fn download(&self, song: &Song, settings: &Settings) -> Result<Option<PathBuf>, DownloadError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    struct MetadataOnly;

    impl Downloader for MetadataOnly {
        fn name(&self) -> &str {
            "metadata-only"
        }

        fn download(
            &self,
            _song: &Song,
            _settings: &Settings,
        ) -> Result<Option<PathBuf>, DownloadError> {
            Ok(None)
        }
    }

    #[test]
    fn test_trait_object_dispatch() {
        let downloader: Box<dyn Downloader> = Box::new(MetadataOnly);
        let result = downloader
            .download(&fixtures::song("Air", "La femme d'argent"), &Settings::default())
            .unwrap();
        assert_eq!(downloader.name(), "metadata-only");
        assert!(result.is_none());
    }
}
