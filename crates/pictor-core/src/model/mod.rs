//! Request descriptor model shared across the facade.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SourceError;
use crate::processing::Processor;

/// Where the image bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Plain URL fetched with the pipeline's default transport settings.
    Url(Url),
    /// Fully specified network request for callers that need transport
    /// control.
    Request(NetworkRequest),
}

impl ImageSource {
    /// URL the source ultimately points at.
    #[must_use]
    pub const fn url(&self) -> &Url {
        match self {
            Self::Url(url) => url,
            Self::Request(request) => &request.url,
        }
    }
}

/// Raw network-request equivalent of a URL source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    /// Resource location.
    pub url: Url,
    /// HTTP method, `GET` for plain fetches.
    pub method: String,
    /// Additional headers forwarded verbatim to the transport.
    pub headers: Vec<(String, String)>,
}

impl NetworkRequest {
    /// Plain GET request for the given URL.
    #[must_use]
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: "GET".to_owned(),
            headers: Vec::new(),
        }
    }
}

/// Relative scheduling priority of a request. Affects the order in which
/// the pipeline executes queued loads.
#[derive(
    Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Prefetch-style work that should never displace visible loads.
    VeryLow,
    /// Below-default priority.
    Low,
    /// Default priority level assigned to new requests.
    #[default]
    Normal,
    /// Above-default priority.
    High,
    /// Highest available priority for urgent, user-visible loads.
    VeryHigh,
}

/// How a request interacts with the pipeline's caches.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Honour every cache layer the pipeline exposes.
    #[default]
    Default,
    /// Skip cached data and always refetch from the source.
    ReloadIgnoringCachedData,
    /// Serve cached data only; fail instead of touching the network.
    ReturnCacheDataDontLoad,
}

/// Advanced per-request options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RequestOptions {
    /// Whether the memory cache may satisfy this request.
    pub memory_cache_read: bool,
    /// Whether the decoded result may be stored in the memory cache.
    pub memory_cache_write: bool,
    /// Replacement URL used for cache-key purposes, e.g. to strip volatile
    /// query parameters.
    pub filtered_url: Option<String>,
    /// Full cache-key override; wins over the source URL and
    /// `filtered_url`.
    pub cache_key: Option<String>,
    /// Key used to coalesce in-flight loads of the same resource.
    pub load_key: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            memory_cache_read: true,
            memory_cache_write: true,
            filtered_url: None,
            cache_key: None,
            load_key: None,
        }
    }
}

/// Decoded-image stand-in carried through the facade.
///
/// Decoding is owned by the pipeline; the facade only needs stable pixel
/// dimensions and an opaque payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageFrame {
    /// Horizontal pixel count.
    pub width: u32,
    /// Vertical pixel count.
    pub height: u32,
    /// Opaque decoded payload.
    #[serde(default)]
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// Frame with the given dimensions and an empty payload.
    #[must_use]
    pub const fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: Vec::new(),
        }
    }
}

/// Accumulated, immutable specification of one logical image request.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    /// Source locator resolved at construction time.
    pub source: ImageSource,
    /// Scheduling priority, [`Priority::Normal`] by default.
    pub priority: Priority,
    /// Cache interaction policy.
    pub cache_policy: CachePolicy,
    /// Ordered processing steps, applied strictly in append order.
    pub processors: Vec<Processor>,
    /// Advanced options record.
    pub options: RequestOptions,
    /// Arbitrary auxiliary data forwarded to pipeline observers.
    pub user_info: BTreeMap<String, serde_json::Value>,
}

impl ImageRequest {
    /// Request with default options for the given source.
    #[must_use]
    pub fn new(source: ImageSource) -> Self {
        Self {
            source,
            priority: Priority::default(),
            cache_policy: CachePolicy::default(),
            processors: Vec::new(),
            options: RequestOptions::default(),
            user_info: BTreeMap::new(),
        }
    }

    /// Canonical cache key for the request: the source key followed by
    /// every processor identity in append order.
    ///
    /// Pipelines rely on this key to deduplicate equivalent requests, so
    /// two requests with equal sources and equal effective processor
    /// parameters must produce identical keys.
    #[must_use]
    pub fn cache_key(&self) -> String {
        let mut key = self.options.cache_key.clone().unwrap_or_else(|| {
            self.options
                .filtered_url
                .clone()
                .unwrap_or_else(|| self.source.url().as_str().to_owned())
        });
        for processor in &self.processors {
            key.push('|');
            key.push_str(processor.identity());
        }
        key
    }
}

/// Conversion contract accepted by builder constructors.
///
/// Mirrors the pipeline's canonical descriptor constructor: URLs, raw
/// network requests, and prebuilt descriptors convert infallibly; textual
/// locators fail when they do not parse.
pub trait IntoImageRequest {
    /// Convert the value into a full request descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidUrl`] when a textual locator cannot be
    /// parsed.
    fn into_image_request(self) -> Result<ImageRequest, SourceError>;
}

impl IntoImageRequest for ImageRequest {
    fn into_image_request(self) -> Result<ImageRequest, SourceError> {
        Ok(self)
    }
}

impl IntoImageRequest for ImageSource {
    fn into_image_request(self) -> Result<ImageRequest, SourceError> {
        Ok(ImageRequest::new(self))
    }
}

impl IntoImageRequest for Url {
    fn into_image_request(self) -> Result<ImageRequest, SourceError> {
        Ok(ImageRequest::new(ImageSource::Url(self)))
    }
}

impl IntoImageRequest for NetworkRequest {
    fn into_image_request(self) -> Result<ImageRequest, SourceError> {
        Ok(ImageRequest::new(ImageSource::Request(self)))
    }
}

impl IntoImageRequest for &str {
    fn into_image_request(self) -> Result<ImageRequest, SourceError> {
        let url = Url::parse(self).map_err(|source| SourceError::InvalidUrl {
            url: self.to_owned(),
            source,
        })?;
        url.into_image_request()
    }
}

impl IntoImageRequest for String {
    fn into_image_request(self) -> Result<ImageRequest, SourceError> {
        self.as_str().into_image_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{ResizeSpec, Size};

    fn sample_request() -> ImageRequest {
        "https://example.com/image.jpeg"
            .into_image_request()
            .expect("sample url should parse")
    }

    #[test]
    fn priorities_are_ordered() {
        assert!(Priority::VeryLow < Priority::Low);
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert!(Priority::High < Priority::VeryHigh);
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn invalid_locator_fails_at_conversion() {
        let result = "not a url".into_image_request();
        assert!(matches!(result, Err(SourceError::InvalidUrl { .. })));
    }

    #[test]
    fn new_request_uses_default_knobs() {
        let request = sample_request();
        assert_eq!(request.priority, Priority::Normal);
        assert_eq!(request.cache_policy, CachePolicy::Default);
        assert!(request.processors.is_empty());
        assert!(request.options.memory_cache_read);
        assert!(request.options.memory_cache_write);
        assert!(request.user_info.is_empty());
    }

    #[test]
    fn cache_key_appends_processor_identities_in_order() {
        let mut request = sample_request();
        request
            .processors
            .push(Processor::resize(ResizeSpec::new(Size::new(100.0, 100.0))));
        request.processors.push(Processor::gaussian_blur(8));

        let key = request.cache_key();
        assert!(key.starts_with("https://example.com/image.jpeg|"));
        let blur = key.rfind("gaussian-blur").expect("blur identity present");
        let resize = key.find("resize").expect("resize identity present");
        assert!(resize < blur);
    }

    #[test]
    fn cache_key_override_wins_over_source() {
        let mut request = sample_request();
        request.options.filtered_url = Some("https://example.com/image".to_owned());
        assert!(request.cache_key().starts_with("https://example.com/image"));

        request.options.cache_key = Some("custom-key".to_owned());
        assert_eq!(request.cache_key(), "custom-key");
    }

    #[test]
    fn network_request_source_exposes_url() {
        let url = Url::parse("https://example.com/header.jpeg").expect("url should parse");
        let source = ImageSource::Request(NetworkRequest::get(url.clone()));
        assert_eq!(source.url(), &url);
    }
}
