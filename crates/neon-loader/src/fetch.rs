//! Out-of-band resource fetching.
//!
//! The loader only describes what to fetch; the driver runs the requests
//! through a [`ResourceFetcher`]. `HttpFetcher` talks to a live site,
//! `FileFetcher` serves a local checkout of the site's public directory.

use crate::error::{LoaderError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use url::Url;

/// A resource that was fetched successfully.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResource {
    pub url: String,
    pub content_type: Option<String>,
    pub bytes: usize,
}

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource>;
}

/// Fetches resources over HTTP, resolving relative references against a base URL.
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Option<Url>,
}

impl HttpFetcher {
    pub fn new(base: Option<Url>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("neon-loader/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| LoaderError::Fetch {
                url: String::new(),
                reason: format!("building HTTP client: {e}"),
            })?;
        Ok(Self { client, base })
    }

    /// Resolve a resource reference to an absolute URL.
    pub fn resolve(&self, reference: &str) -> Result<Url> {
        let parsed = match &self.base {
            Some(base) => base.join(reference),
            None => Url::parse(reference),
        };
        parsed.map_err(|e| LoaderError::Fetch {
            url: reference.to_string(),
            reason: format!("invalid URL: {e}"),
        })
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource> {
        if url.starts_with("data:") {
            return Ok(inline_resource(url));
        }

        let target = self.resolve(url)?;
        let fail = |reason: String| LoaderError::Fetch {
            url: url.to_string(),
            reason,
        };

        let resp = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LoaderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await.map_err(|e| fail(e.to_string()))?;

        check_payload(url, content_type, body.len())
    }
}

/// Serves resources from a local directory, mapping `/img/a.jpg` to
/// `<root>/img/a.jpg`.
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn local_path(&self, url: &str) -> Result<PathBuf> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let relative = Path::new(path.trim_start_matches('/'));
        // Refuse to escape the root.
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(LoaderError::Fetch {
                url: url.to_string(),
                reason: "path escapes the site root".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ResourceFetcher for FileFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource> {
        if url.starts_with("data:") {
            return Ok(inline_resource(url));
        }

        let path = self.local_path(url)?;
        let body = tokio::fs::read(&path).await.map_err(|e| LoaderError::Fetch {
            url: url.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;

        check_payload(url, guess_content_type(&path), body.len())
    }
}

fn inline_resource(url: &str) -> FetchedResource {
    let content_type = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split([';', ',']).next())
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    FetchedResource {
        url: url.to_string(),
        content_type,
        bytes: url.len(),
    }
}

/// An empty body or a non-image payload counts as a decode failure.
fn check_payload(url: &str, content_type: Option<String>, bytes: usize) -> Result<FetchedResource> {
    if bytes == 0 {
        return Err(LoaderError::Fetch {
            url: url.to_string(),
            reason: "empty response body".to_string(),
        });
    }
    if let Some(ct) = content_type.as_deref() {
        if !ct.starts_with("image/") && !ct.starts_with("application/octet-stream") {
            return Err(LoaderError::Fetch {
                url: url.to_string(),
                reason: format!("unexpected content type {ct}"),
            });
        }
    }
    Ok(FetchedResource {
        url: url.to_string(),
        content_type,
        bytes,
    })
}

fn guess_content_type(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let ct = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => return None,
    };
    Some(ct.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/a.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0]),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Some(Url::parse(&server.uri()).unwrap())).unwrap();
        let res = fetcher.fetch("/img/a.jpg").await.unwrap();
        assert_eq!(res.url, "/img/a.jpg");
        assert_eq!(res.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(res.bytes, 4);
    }

    #[tokio::test]
    async fn test_http_fetch_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Some(Url::parse(&server.uri()).unwrap())).unwrap();
        let err = fetcher.fetch("/img/missing.jpg").await.unwrap_err();
        assert_eq!(
            err,
            LoaderError::HttpStatus {
                url: "/img/missing.jpg".to_string(),
                status: 404
            }
        );
    }

    #[tokio::test]
    async fn test_http_fetch_rejects_html() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img/soft404.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html>not found</html>"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(Some(Url::parse(&server.uri()).unwrap())).unwrap();
        let err = fetcher.fetch("/img/soft404.jpg").await.unwrap_err();
        assert!(matches!(err, LoaderError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_data_uri_needs_no_network() {
        let fetcher = HttpFetcher::new(None).unwrap();
        let res = fetcher.fetch("data:image/svg+xml;base64,PHN2Zy8+").await.unwrap();
        assert_eq!(res.content_type.as_deref(), Some("image/svg+xml"));
    }

    #[test]
    fn test_resolve_without_base_requires_absolute() {
        let fetcher = HttpFetcher::new(None).unwrap();
        assert!(fetcher.resolve("/img/a.jpg").is_err());
        assert!(fetcher.resolve("https://neonmurer.ch/img/a.jpg").is_ok());
    }

    #[tokio::test]
    async fn test_file_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("img")).unwrap();
        std::fs::write(dir.path().join("img/a.png"), [0x89, b'P', b'N', b'G']).unwrap();

        let fetcher = FileFetcher::new(dir.path());
        let res = fetcher.fetch("/img/a.png?v=2").await.unwrap();
        assert_eq!(res.content_type.as_deref(), Some("image/png"));
        assert_eq!(res.bytes, 4);

        assert!(fetcher.fetch("/img/missing.png").await.is_err());
        assert!(fetcher.fetch("/../etc/passwd").await.is_err());
    }
}
