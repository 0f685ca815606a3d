use super::frontier::DocumentKind;
use crate::config::CrawlerConfig;
use crate::error::{CrawlerError, FetchError};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects.
    pub url: Url,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Fetched {
    /// Which extractor handles this body. `None` means the document is skipped.
    pub fn kind(&self) -> Option<DocumentKind> {
        let mime = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .unwrap_or("");

        match mime {
            "text/html" | "application/xhtml+xml" => Some(DocumentKind::Html),
            "application/pdf" | "application/x-pdf" => Some(DocumentKind::Pdf),
            "" | "application/octet-stream" | "binary/octet-stream" => {
                if self.body.starts_with(b"%PDF-")
                    || DocumentKind::guess(&self.url) == DocumentKind::Pdf
                {
                    Some(DocumentKind::Pdf)
                } else if mime.is_empty() {
                    Some(DocumentKind::Html)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_page_bytes: usize,
    max_pdf_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Fetcher, CrawlerError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()?;
        Ok(Fetcher {
            client,
            max_page_bytes: config.max_page_bytes,
            max_pdf_bytes: config.max_pdf_bytes,
        })
    }

    fn limit(&self, kind: Option<DocumentKind>) -> usize {
        match kind {
            Some(DocumentKind::Html) => self.max_page_bytes,
            Some(DocumentKind::Pdf) => self.max_pdf_bytes,
            None => self.max_page_bytes.max(self.max_pdf_bytes),
        }
    }

    pub async fn fetch(&self, url: &Url) -> Result<Fetched, FetchError> {
        debug!("Visit {}", url);
        let mut resp = self.client.get(url.clone()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let final_url = resp.url().clone();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase);

        // Only a declared type is trusted before the body is read, anything
        // else gets the larger of the two caps.
        let declared = match content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
        {
            Some("text/html") | Some("application/xhtml+xml") => Some(DocumentKind::Html),
            Some("application/pdf") | Some("application/x-pdf") => Some(DocumentKind::Pdf),
            _ => None,
        };
        let limit = self.limit(declared);
        if let Some(len) = resp.content_length() {
            if len as usize > limit {
                return Err(FetchError::TooLarge(len as usize));
            }
        }

        let mut body = vec![];
        while let Some(chunk) = resp.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() > limit {
                return Err(FetchError::TooLarge(body.len()));
            }
        }

        let fetched = Fetched {
            url: final_url,
            content_type,
            body,
        };
        if let Some(kind) = fetched.kind() {
            if fetched.body.len() > self.limit(Some(kind)) {
                return Err(FetchError::TooLarge(fetched.body.len()));
            }
        }
        Ok(fetched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fetched(url: &str, content_type: Option<&str>, body: &[u8]) -> Fetched {
        Fetched {
            url: Url::parse(url).unwrap(),
            content_type: content_type.map(ToString::to_string),
            body: body.to_vec(),
        }
    }

    #[test]
    fn kind_from_content_type() {
        let html = fetched("https://a.example/", Some("text/html; charset=utf-8"), b"<p>");
        assert_eq!(html.kind(), Some(DocumentKind::Html));

        let pdf = fetched("https://a.example/doc", Some("application/pdf"), b"%PDF-1.4");
        assert_eq!(pdf.kind(), Some(DocumentKind::Pdf));

        let image = fetched("https://a.example/logo.png", Some("image/png"), b"\x89PNG");
        assert_eq!(image.kind(), None);
    }

    #[test]
    fn kind_sniffed_without_content_type() {
        let pdf = fetched("https://a.example/download?id=1", None, b"%PDF-1.7\n");
        assert_eq!(pdf.kind(), Some(DocumentKind::Pdf));

        let pdf = fetched("https://a.example/cert.pdf", Some("application/octet-stream"), b"");
        assert_eq!(pdf.kind(), Some(DocumentKind::Pdf));

        let html = fetched("https://a.example/", None, b"<html></html>");
        assert_eq!(html.kind(), Some(DocumentKind::Html));

        let blob = fetched("https://a.example/file", Some("application/octet-stream"), b"zz");
        assert_eq!(blob.kind(), None);
    }

    #[tokio::test]
    async fn non_success_status_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let fetcher = Fetcher::new(&CrawlerConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/missing", server.url())).unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap_err(), FetchError::Status(404));

        m.assert_async().await;
    }

    #[tokio::test]
    async fn oversized_pdf_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _big = server
            .mock("GET", "/big.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(vec![b'x'; 2048])
            .create_async()
            .await;

        let config = CrawlerConfig {
            max_pdf_bytes: 1024,
            ..Default::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();
        let url = Url::parse(&format!("{}/big.pdf", server.url())).unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap_err(), FetchError::TooLarge(2048));
    }

    #[tokio::test]
    async fn oversized_page_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _big = server
            .mock("GET", "/catalogue")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(vec![b'x'; 4096])
            .create_async()
            .await;
        let _small = server
            .mock("GET", "/about")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<p>ASC</p>")
            .create_async()
            .await;

        let config = CrawlerConfig {
            max_page_bytes: 1024,
            ..Default::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();

        let url = Url::parse(&format!("{}/catalogue", server.url())).unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap_err(), FetchError::TooLarge(4096));

        let url = Url::parse(&format!("{}/about", server.url())).unwrap();
        assert_eq!(fetcher.fetch(&url).await.unwrap().body, b"<p>ASC</p>".to_vec());
    }

    #[test]
    fn undeclared_type_gets_the_larger_cap() {
        let config = CrawlerConfig {
            max_page_bytes: 10,
            max_pdf_bytes: 100,
            ..Default::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();
        assert_eq!(fetcher.limit(Some(DocumentKind::Html)), 10);
        assert_eq!(fetcher.limit(Some(DocumentKind::Pdf)), 100);
        assert_eq!(fetcher.limit(None), 100);
    }
}
