//! Resolution of page-relative URLs

use crate::error::{FetchError, FetchResult};
use reqwest::Url;

/// Turns the relative URLs pages use into absolute ones and decides which
/// requests belong to the API.
///
/// Relative paths under the API prefix resolve against the API base; every
/// other relative path resolves against the application origin.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    origin: Url,
    api_base: Url,
    api_prefix: String,
}

impl UrlResolver {
    /// Build a resolver. Both bases must be absolute http(s) URLs.
    pub fn new(origin: &str, api_base: &str, api_prefix: &str) -> FetchResult<Self> {
        let origin = parse_base(origin)?;
        let api_base = parse_base(api_base)?;
        if !api_prefix.starts_with('/') {
            return Err(FetchError::InvalidUrl(format!("API prefix must start with '/': {api_prefix}")));
        }
        Ok(Self {
            origin,
            api_base,
            api_prefix: api_prefix.to_owned(),
        })
    }

    /// Absolute form of `url`
    pub fn resolve(&self, url: &str) -> FetchResult<Url> {
        if let Ok(absolute) = Url::parse(url) {
            return Ok(absolute);
        }
        let base = if url.starts_with(&self.api_prefix) {
            &self.api_base
        } else {
            &self.origin
        };
        base.join(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))
    }

    /// Whether `url` targets the API (its path starts with the API prefix)
    pub fn is_api(&self, url: &str) -> bool {
        match Url::parse(url) {
            Ok(absolute) => absolute.path().starts_with(&self.api_prefix),
            Err(_) => url.starts_with(&self.api_prefix),
        }
    }

    /// Application origin
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// API base URL
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }
}

fn parse_base(raw: &str) -> FetchResult<Url> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(format!("{raw}: unsupported scheme")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> UrlResolver {
        UrlResolver::new("http://localhost:5173", "http://localhost:8000", "/api/").unwrap()
    }

    #[test]
    fn test_relative_api_path_uses_api_base() {
        let url = resolver().resolve("/api/v1/animales?page=2").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/v1/animales?page=2");
    }

    #[test]
    fn test_relative_static_path_uses_origin() {
        let url = resolver().resolve("/index.html").unwrap();
        assert_eq!(url.as_str(), "http://localhost:5173/index.html");
    }

    #[test]
    fn test_absolute_url_untouched() {
        let url = resolver().resolve("https://cdn.example.com/font.woff2").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/font.woff2");
    }

    #[test]
    fn test_api_detection() {
        let resolver = resolver();
        assert!(resolver.is_api("/api/v1/potreros"));
        assert!(resolver.is_api("http://localhost:8000/api/v1/potreros"));
        assert!(!resolver.is_api("/src/App.tsx"));
        assert!(!resolver.is_api("/apiary.png"));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(UrlResolver::new("localhost", "http://localhost:8000", "/api/").is_err());
        assert!(UrlResolver::new("ftp://host", "http://localhost:8000", "/api/").is_err());
        assert!(UrlResolver::new("http://a", "http://b", "api/").is_err());
    }
}
