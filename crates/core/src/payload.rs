//! Image payload resolution
//!
//! An image annotation's `src` is an embedded `data:` URL, a remote `http(s)`
//! URL, or a local file path. Payloads are fetched fully and decoded once to
//! validate them before anything is embedded.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;

/// Where an image payload lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Embedded `data:` URL
    Data {
        mime: String,
        base64: bool,
        body: String,
    },
    /// `http://` or `https://` locator
    Remote(String),
    /// Anything else is read from disk
    File(PathBuf),
}

impl ImageSource {
    /// Classify a `src` string
    pub fn classify(src: &str) -> Result<Self, PayloadError> {
        let src = src.trim();
        if let Some(rest) = strip_prefix_ignore_case(src, "data:") {
            let (header, body) = rest
                .split_once(',')
                .ok_or_else(|| PayloadError::InvalidDataUrl("missing ',' separator".to_string()))?;
            let mut params = header.split(';');
            let mime = params.next().unwrap_or_default().trim().to_ascii_lowercase();
            let base64 = params.any(|param| param.trim().eq_ignore_ascii_case("base64"));
            return Ok(Self::Data {
                mime,
                base64,
                body: body.to_string(),
            });
        }
        if strip_prefix_ignore_case(src, "http://").is_some()
            || strip_prefix_ignore_case(src, "https://").is_some()
        {
            return Ok(Self::Remote(src.to_string()));
        }
        if src.is_empty() {
            return Err(PayloadError::EmptySource);
        }
        Ok(Self::File(PathBuf::from(src)))
    }

    /// Sniff the codec from the MIME type or the locator's extension
    pub fn format(&self) -> Option<ImageFormat> {
        match self {
            Self::Data { mime, .. } => ImageFormat::from_mime(mime),
            Self::Remote(url) => {
                let path = url
                    .split(['?', '#'])
                    .next()
                    .unwrap_or_default();
                ImageFormat::from_path(Path::new(path))
            }
            Self::File(path) => ImageFormat::from_path(path),
        }
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// Supported embedding codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" | "jpe" => Some(Self::Jpeg),
            _ => None,
        }
    }

    fn codec(self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

/// Errors while resolving a single payload
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("image source is empty")]
    EmptySource,

    #[error("unsupported image format: {0}")]
    Unsupported(String),

    #[error("malformed data URL: {0}")]
    InvalidDataUrl(String),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Fetches remote payloads
pub trait PayloadFetcher {
    /// Fetch the complete body at `url`
    fn fetch(&self, url: &str) -> Result<Vec<u8>, PayloadError>;
}

/// Blocking HTTP fetcher
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl PayloadFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, PayloadError> {
        let fetch_error = |reason: String| PayloadError::Fetch {
            url: url.to_string(),
            reason,
        };
        let response = self
            .agent
            .get(url)
            .set("User-Agent", "stamper")
            .call()
            .map_err(|e| fetch_error(e.to_string()))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| fetch_error(e.to_string()))?;
        Ok(bytes)
    }
}

/// A validated image ready to embed
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub format: ImageFormat,
    /// Encoded bytes as received
    pub bytes: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    pub has_alpha: bool,
}

impl ImagePayload {
    /// Decode `bytes` as `format` to validate them
    pub fn decode(format: ImageFormat, bytes: Vec<u8>) -> Result<Self, PayloadError> {
        let decoded = image::load_from_memory_with_format(&bytes, format.codec())?;
        Ok(Self {
            format,
            width_px: decoded.width(),
            height_px: decoded.height(),
            has_alpha: decoded.color().has_alpha(),
            bytes,
        })
    }
}

/// Resolve an image `src` into a decoded payload.
///
/// Unsupported formats are rejected before anything is fetched.
pub fn resolve_payload(src: &str, fetcher: &dyn PayloadFetcher) -> Result<ImagePayload, PayloadError> {
    let source = ImageSource::classify(src)?;
    let format = source
        .format()
        .ok_or_else(|| PayloadError::Unsupported(describe(&source)))?;

    let bytes = match &source {
        ImageSource::Data { base64, body, .. } => {
            if *base64 {
                let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                base64::engine::general_purpose::STANDARD.decode(compact)?
            } else {
                body.as_bytes().to_vec()
            }
        }
        ImageSource::Remote(url) => {
            tracing::debug!(%url, "fetching remote image");
            fetcher.fetch(url)?
        }
        ImageSource::File(path) => std::fs::read(path)?,
    };

    ImagePayload::decode(format, bytes)
}

fn describe(source: &ImageSource) -> String {
    match source {
        ImageSource::Data { mime, .. } if mime.is_empty() => "data URL without MIME type".to_string(),
        ImageSource::Data { mime, .. } => mime.clone(),
        ImageSource::Remote(url) => url.clone(),
        ImageSource::File(path) => path.display().to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io::Cursor;

    pub(crate) fn png_bytes() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(3, 2, image::Rgba([255, 0, 0, 128]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    pub(crate) fn png_data_url() -> String {
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png_bytes())
        )
    }

    /// Serves fixed bytes and counts requests
    pub(crate) struct StaticFetcher {
        pub body: Vec<u8>,
        pub calls: Cell<usize>,
    }

    impl StaticFetcher {
        pub fn new(body: Vec<u8>) -> Self {
            Self {
                body,
                calls: Cell::new(0),
            }
        }
    }

    impl PayloadFetcher for StaticFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, PayloadError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.body.clone())
        }
    }

    #[test]
    fn test_classify_sources() {
        assert!(matches!(
            ImageSource::classify("data:image/png;base64,AAAA").unwrap(),
            ImageSource::Data { ref mime, base64: true, .. } if mime == "image/png"
        ));
        assert_eq!(
            ImageSource::classify("HTTPS://example.com/logo.PNG?v=2").unwrap(),
            ImageSource::Remote("HTTPS://example.com/logo.PNG?v=2".to_string())
        );
        assert_eq!(
            ImageSource::classify("./stamp.jpg").unwrap(),
            ImageSource::File(PathBuf::from("./stamp.jpg"))
        );
        assert!(matches!(ImageSource::classify("  "), Err(PayloadError::EmptySource)));
    }

    #[test]
    fn test_format_sniffing() {
        let sniff = |src: &str| ImageSource::classify(src).unwrap().format();
        assert_eq!(sniff("data:image/jpeg;base64,AAAA"), Some(ImageFormat::Jpeg));
        assert_eq!(sniff("https://example.com/a.png?size=large"), Some(ImageFormat::Png));
        assert_eq!(sniff("scan.JPEG"), Some(ImageFormat::Jpeg));
        assert_eq!(sniff("data:image/gif;base64,R0lG"), None);
        assert_eq!(sniff("https://example.com/a.webp"), None);
    }

    #[test]
    fn test_decode_data_url() {
        let fetcher = StaticFetcher::new(Vec::new());
        let payload = resolve_payload(&png_data_url(), &fetcher).unwrap();
        assert_eq!(payload.format, ImageFormat::Png);
        assert_eq!((payload.width_px, payload.height_px), (3, 2));
        assert!(payload.has_alpha);
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn test_remote_payload_is_fetched() {
        let fetcher = StaticFetcher::new(png_bytes());
        let payload = resolve_payload("https://example.com/stamp.png", &fetcher).unwrap();
        assert_eq!(payload.width_px, 3);
        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn test_unsupported_format_skips_fetch() {
        let fetcher = StaticFetcher::new(png_bytes());
        let err = resolve_payload("https://example.com/stamp.gif", &fetcher).unwrap_err();
        assert!(matches!(err, PayloadError::Unsupported(_)));
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn test_mislabelled_payload_fails_decode() {
        let fetcher = StaticFetcher::new(png_bytes());
        let err = resolve_payload("https://example.com/stamp.jpg", &fetcher).unwrap_err();
        assert!(matches!(err, PayloadError::Decode(_)));
    }

    #[test]
    fn test_local_file_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stamp.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let fetcher = StaticFetcher::new(Vec::new());
        let payload = resolve_payload(path.to_str().unwrap(), &fetcher).unwrap();
        assert_eq!(payload.height_px, 2);

        let missing = dir.path().join("missing.png");
        assert!(matches!(
            resolve_payload(missing.to_str().unwrap(), &fetcher),
            Err(PayloadError::Io(_))
        ));
    }
}
