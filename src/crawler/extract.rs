use super::fetch::Fetched;
use super::frontier::DocumentKind;
use itertools::Itertools;
use lazy_regex::regex;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tracing::warn;
use url::Url;

const E: &str = "Invalid selector";
lazy_static! {
    static ref A: Selector = Selector::parse("a[href]").expect(E);
    static ref BASE: Selector = Selector::parse("base[href]").expect(E);
}

const INVISIBLE: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Extracted {
    pub text: String,
    pub links: Vec<Url>,
}

pub async fn extract(kind: DocumentKind, fetched: Fetched) -> Extracted {
    match kind {
        DocumentKind::Html => extract_html(&fetched.body, &fetched.url),
        DocumentKind::Pdf => {
            let body = fetched.body;
            let text = tokio::task::spawn_blocking(move || extract_pdf(&body))
                .await
                .unwrap_or_default();
            Extracted {
                text,
                links: vec![],
            }
        }
    }
}

pub fn extract_html(body: &[u8], page_url: &Url) -> Extracted {
    let html = String::from_utf8_lossy(body);
    if html.trim().is_empty() {
        return Extracted::default();
    }
    let doc = Html::parse_document(&html);

    Extracted {
        text: visible_text(&doc),
        links: extract_links(&doc, page_url),
    }
}

fn visible_text(doc: &Html) -> String {
    let text = doc
        .root_element()
        .descendants()
        .filter_map(|node| node.value().as_text().map(|t| (node, t)))
        .filter(|(node, _)| {
            !node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map_or(false, |el| INVISIBLE.contains(&el.name()))
            })
        })
        .map(|(_, t)| t.trim())
        .filter(|t| !t.is_empty())
        .join(" ");

    regex!(r"\s+").replace_all(&text, " ").into_owned()
}

fn extract_links(doc: &Html, page_url: &Url) -> Vec<Url> {
    let base = doc
        .select(&BASE)
        .next()
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone());

    doc.select(&A)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| base.join(l).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|mut u| {
            u.set_fragment(None);
            u
        })
        .unique()
        .collect()
}

/// Text layer only. Unreadable documents give an empty string.
pub fn extract_pdf(body: &[u8]) -> String {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(body)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("Unreadable PDF: {:?}", e);
            String::new()
        }
        Err(_) => {
            warn!("PDF extraction panicked");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{CertifyingBody, Matcher};
    use pretty_assertions::assert_eq;

    const PAGE: &str = r##"
        <html>
          <head>
            <title>Nordic Salmon Processing</title>
            <style>.asc { color: red }</style>
            <script>var cert = "Best Aquaculture Practices";</script>
          </head>
          <body>
            <h1>Our   plant</h1>
            <p>Quality first.
               <a href="/sustainability">Sustainability</a></p>
            <a href="certificates/list.html#top">Certificates</a>
            <a href="https://certifier.example/cert.pdf">Certificate</a>
            <a href="mailto:info@salmon.example">Mail</a>
            <a href="#contact">Contact</a>
            <a href="/sustainability">Again</a>
            <noscript>Enable JavaScript for the ASC logo</noscript>
          </body>
        </html>
    "##;

    fn page_url() -> Url {
        Url::parse("https://salmon.example/en/index.html").unwrap()
    }

    #[test]
    fn html_text_skips_script_and_style() {
        let extracted = extract_html(PAGE.as_bytes(), &page_url());
        assert_eq!(
            extracted.text,
            "Nordic Salmon Processing Our plant Quality first. Sustainability Certificates Certificate Mail Contact Again"
        );
        let all = CertifyingBody::ALL.into_iter().collect();
        assert!(Matcher::default().find(&extracted.text, &all).is_empty());
    }

    #[test]
    fn html_links_resolved_against_page() {
        let extracted = extract_html(PAGE.as_bytes(), &page_url());
        assert_eq!(
            extracted.links.iter().map(Url::as_str).collect::<Vec<_>>(),
            vec![
                "https://salmon.example/sustainability",
                "https://salmon.example/en/certificates/list.html",
                "https://certifier.example/cert.pdf",
            ]
        );
    }

    #[test]
    fn base_href_changes_resolution() {
        let html = r#"<html><head><base href="https://cdn.salmon.example/docs/"></head>
            <body><a href="cert.pdf">cert</a></body></html>"#;
        let extracted = extract_html(html.as_bytes(), &page_url());
        assert_eq!(
            extracted.links,
            vec![Url::parse("https://cdn.salmon.example/docs/cert.pdf").unwrap()]
        );
    }

    #[test]
    fn malformed_or_empty_html_yields_nothing_fatal() {
        assert_eq!(extract_html(b"", &page_url()), Extracted::default());

        let extracted = extract_html(b"<div><p>BAP certified<a href='/x'", &page_url());
        assert!(extracted.text.contains("BAP certified"));
    }

    #[test]
    fn pdf_text_layer_is_extracted() {
        let pdf = include_bytes!("../../tests/fixtures/best_aquaculture_practices.pdf");
        let text = extract_pdf(pdf);
        let all = CertifyingBody::ALL.into_iter().collect();
        let matcher = Matcher::default();
        let found = matcher.find(&text, &all);
        assert_eq!(
            found.into_iter().map(|(b, _)| b).collect::<Vec<_>>(),
            vec![CertifyingBody::Bap]
        );
    }

    #[test]
    fn broken_pdf_is_empty_text() {
        assert_eq!(extract_pdf(b"%PDF-1.4\nthis is not really a pdf"), "");
        assert_eq!(extract_pdf(b""), "");
    }

    #[tokio::test]
    async fn pdf_documents_have_no_links() {
        let fetched = Fetched {
            url: Url::parse("https://salmon.example/cert.pdf").unwrap(),
            content_type: Some("application/pdf".to_string()),
            body: include_bytes!("../../tests/fixtures/friend_of_the_sea.pdf").to_vec(),
        };
        let extracted = extract(DocumentKind::Pdf, fetched).await;
        assert!(extracted.links.is_empty());
        assert!(!extracted.text.trim().is_empty());
    }
}
