//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three operations the gallery needs
//! from an image codec: identify, read_exif, and thumbnail. All of them work
//! on in-memory bytes, since images live in object storage, not on disk.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, no system
//! libraries.

use super::exif_parser::ExifData;
use super::params::ThumbnailParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Send + Sync` so one backend can be shared by the gallery builder's
/// rayon workers and the HTTP handlers.
pub trait ImageBackend: Send + Sync {
    /// Stored pixel dimensions from the image header. Works on a truncated
    /// prefix as long as the header is inside it.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Embedded EXIF capture time and orientation. Missing or unreadable
    /// EXIF is empty data, not an error.
    fn read_exif(&self, bytes: &[u8]) -> ExifData;

    /// Decode a full image and produce JPEG thumbnail bytes.
    fn thumbnail(&self, bytes: &[u8], params: &ThumbnailParams) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock backend that answers from tables keyed by the image bytes.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    ///
    /// Bytes with no registered dimensions fail to identify, like an
    /// undecodable file. Bytes registered with [`panic_on`](Self::panic_on)
    /// make `identify` panic, for exercising per-object isolation.
    #[derive(Default)]
    pub struct MockBackend {
        pub dimensions: Mutex<HashMap<Vec<u8>, Dimensions>>,
        pub exif: Mutex<HashMap<Vec<u8>, ExifData>>,
        pub panics: Mutex<Vec<Vec<u8>>>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(usize),
        ReadExif(usize),
        Thumbnail { input_len: usize, max_width: u32 },
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_image(self, bytes: &[u8], width: u32, height: u32, exif: ExifData) -> Self {
            self.dimensions
                .lock()
                .unwrap()
                .insert(bytes.to_vec(), Dimensions { width, height });
            self.exif.lock().unwrap().insert(bytes.to_vec(), exif);
            self
        }

        pub fn panic_on(self, bytes: &[u8]) -> Self {
            self.panics.lock().unwrap().push(bytes.to_vec());
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(bytes.len()));
            if self.panics.lock().unwrap().iter().any(|p| p == bytes) {
                panic!("mock decoder crashed");
            }
            self.dimensions
                .lock()
                .unwrap()
                .get(bytes)
                .copied()
                .ok_or_else(|| BackendError::Decode("unknown mock image".into()))
        }

        fn read_exif(&self, bytes: &[u8]) -> ExifData {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::ReadExif(bytes.len()));
            self.exif
                .lock()
                .unwrap()
                .get(bytes)
                .copied()
                .unwrap_or_default()
        }

        fn thumbnail(
            &self,
            bytes: &[u8],
            params: &ThumbnailParams,
        ) -> Result<Vec<u8>, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Thumbnail {
                input_len: bytes.len(),
                max_width: params.max_width,
            });
            if !self.dimensions.lock().unwrap().contains_key(bytes) {
                return Err(BackendError::Decode("unknown mock image".into()));
            }
            let mut out = b"thumb:".to_vec();
            out.extend_from_slice(bytes);
            Ok(out)
        }
    }

    #[test]
    fn mock_identifies_registered_bytes() {
        let backend = MockBackend::new().with_image(b"img", 40, 30, ExifData::default());
        let dims = backend.identify(b"img").unwrap();
        assert_eq!((dims.width, dims.height), (40, 30));
        assert!(backend.identify(b"other").is_err());
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Identify(3), RecordedOp::Identify(5)]
        );
    }

    #[test]
    fn mock_records_thumbnail() {
        use crate::imaging::{Quality, Sharpening};
        let backend = MockBackend::new().with_image(b"img", 40, 30, ExifData::default());
        let params = ThumbnailParams {
            max_width: 20,
            quality: Quality::new(80),
            sharpening: Some(Sharpening::light()),
        };
        assert_eq!(backend.thumbnail(b"img", &params).unwrap(), b"thumb:img");
        assert_eq!(
            backend.get_operations(),
            vec![RecordedOp::Thumbnail {
                input_len: 3,
                max_width: 20
            }]
        );
    }
}
