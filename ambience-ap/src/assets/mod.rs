//! Asset loading
//!
//! Fetches and decodes loop pairs (`{loop}` + `{loop}-kicks`) and one-shot
//! effects. A missing or undecodable kicks layer is replaced by the main
//! buffer itself, so a pair always carries two valid buffers.

pub mod source;

use crate::audio::buffer::AudioBuffer;
use crate::audio::decoder::decode_wav;
use crate::error::{Error, Result};
use source::AssetSource;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use source::{DirAssets, FetchError, HttpAssets, MemoryAssets};

/// Main loop plus kicks layer, immutable once loaded
#[derive(Debug, Clone)]
pub struct DecodedBufferPair {
    pub main: Arc<AudioBuffer>,
    pub kicks: Arc<AudioBuffer>,
}

impl DecodedBufferPair {
    /// True when the kicks layer was substituted by the main buffer
    pub fn kicks_is_main(&self) -> bool {
        Arc::ptr_eq(&self.main, &self.kicks)
    }
}

/// Name of the kicks asset paired with `loop_name`
pub fn kicks_asset(loop_name: &str) -> String {
    format!("{}-kicks", loop_name)
}

/// Fetch-and-decode front end over an [`AssetSource`]
#[derive(Clone)]
pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
}

impl AssetLoader {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        info!("Asset loader using {}", source.describe());
        Self { source }
    }

    async fn fetch_decoded(&self, name: &str) -> Result<AudioBuffer> {
        let bytes = self.source.fetch(name).await.map_err(|e| Error::AssetLoad {
            asset: name.to_string(),
            status: e.status(),
        })?;
        decode_wav(name, &bytes)
    }

    /// Load `{loop_name}` and `{loop_name}-kicks`.
    ///
    /// The main asset must load and decode; the kicks asset may be absent.
    pub async fn load_pair(&self, loop_name: &str) -> Result<DecodedBufferPair> {
        let kicks_name = kicks_asset(loop_name);
        let (main, kicks) = tokio::join!(
            self.fetch_decoded(loop_name),
            self.fetch_decoded(&kicks_name)
        );

        let main = Arc::new(main?);
        let kicks = match kicks {
            Ok(kicks) => Arc::new(kicks),
            Err(e) => {
                warn!("Kicks layer '{}' unavailable ({}), using main buffer", kicks_name, e);
                Arc::clone(&main)
            }
        };

        debug!(
            "Loaded pair '{}' ({:.2}s main, {:.2}s kicks)",
            loop_name,
            main.duration_secs(),
            kicks.duration_secs()
        );
        Ok(DecodedBufferPair { main, kicks })
    }

    /// Load a single one-shot buffer (the click sound)
    pub async fn load_effect(&self, name: &str) -> Result<Arc<AudioBuffer>> {
        let buffer = self.fetch_decoded(name).await?;
        debug!("Loaded effect '{}' ({:.3}s)", name, buffer.duration_secs());
        Ok(Arc::new(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::io::Cursor;

    fn wav(frames: usize) -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                writer.write_sample((i % 100) as i16 * 100).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn loader(assets: MemoryAssets) -> AssetLoader {
        AssetLoader::new(Arc::new(assets))
    }

    #[tokio::test]
    async fn test_pair_with_both_layers() {
        let assets = MemoryAssets::new();
        assets.insert("main", wav(800));
        assets.insert("main-kicks", wav(400));

        let pair = loader(assets).load_pair("main").await.unwrap();
        assert!(!pair.kicks_is_main());
        assert_eq!(pair.main.frames(), 800);
        assert_eq!(pair.kicks.frames(), 400);
    }

    #[tokio::test]
    async fn test_missing_kicks_reuses_main_buffer() {
        let assets = MemoryAssets::new();
        assets.insert("login", wav(800));

        let pair = loader(assets).load_pair("login").await.unwrap();
        assert!(pair.kicks_is_main());
        assert!(Arc::ptr_eq(&pair.main, &pair.kicks));
    }

    #[tokio::test]
    async fn test_corrupt_kicks_reuses_main_buffer() {
        let assets = MemoryAssets::new();
        assets.insert("create", wav(800));
        assets.insert("create-kicks", b"garbage".to_vec());

        let pair = loader(assets).load_pair("create").await.unwrap();
        assert!(pair.kicks_is_main());
    }

    #[tokio::test]
    async fn test_missing_main_is_asset_load_error() {
        let assets = MemoryAssets::new();
        assets.insert("create-kicks", wav(800));

        match loader(assets).load_pair("create").await {
            Err(Error::AssetLoad { asset, status }) => {
                assert_eq!(asset, "create");
                assert_eq!(status, Some(404));
            }
            other => panic!("Expected AssetLoad, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_main_is_decode_error() {
        let assets = MemoryAssets::new();
        assets.insert("main", b"not audio".to_vec());

        assert!(matches!(
            loader(assets).load_pair("main").await,
            Err(Error::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_effect() {
        let assets = MemoryAssets::new();
        assets.insert("ahh", wav(80));
        let loader = loader(assets);

        assert_eq!(loader.load_effect("ahh").await.unwrap().frames(), 80);
        assert!(loader.load_effect("missing").await.is_err());
    }
}
