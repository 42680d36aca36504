use crate::error::IngestError;
use crate::models::{Document, SourceKind};
use crate::sources::{FetchReport, SkippedSource};
use regex::Regex;
use reqwest::Client;
use tracing::{info, warn};
use url::Url;

/// Fetches a sitemap and returns the page URLs listed in it, resolved
/// against the sitemap's own location.
pub async fn sitemap_urls(client: &Client, sitemap_url: &str) -> Result<Vec<String>, IngestError> {
    let base = Url::parse(sitemap_url)?;
    let response = client.get(base.clone()).send().await?;
    if !response.status().is_success() {
        return Err(IngestError::Fetch {
            url: sitemap_url.to_string(),
            details: format!("sitemap returned {}", response.status()),
        });
    }
    let body = response.text().await?;

    let mut urls = Vec::new();
    for loc in parse_sitemap(&body)? {
        urls.push(base.join(&loc)?.to_string());
    }
    Ok(urls)
}

pub fn parse_sitemap(xml: &str) -> Result<Vec<String>, IngestError> {
    let loc = Regex::new(r"<loc>\s*([^<]+?)\s*</loc>")?;
    Ok(loc
        .captures_iter(xml)
        .map(|capture| capture[1].to_string())
        .collect())
}

/// Reduces an HTML page to its visible text: script/style/noscript blocks
/// and comments removed, tags replaced with line breaks, basic entities
/// decoded, blank lines collapsed.
pub fn strip_html(html: &str) -> Result<String, IngestError> {
    let blocks = Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)>")?;
    let comments = Regex::new(r"(?s)<!--.*?-->")?;
    let tags = Regex::new(r"(?s)<[^>]+>")?;

    let without_blocks = blocks.replace_all(html, " ");
    let without_comments = comments.replace_all(&without_blocks, " ");
    let text = tags.replace_all(&without_comments, "\n");

    // `&amp;` goes last so nested entities like `&amp;lt;` decode to the
    // literal `&lt;` instead of being decoded twice.
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    Ok(decoded
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

pub async fn fetch_page(client: &Client, url: &str) -> Result<Document, IngestError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(IngestError::Fetch {
            url: url.to_string(),
            details: format!("page returned {}", response.status()),
        });
    }
    let html = response.text().await?;
    Ok(Document {
        text: strip_html(&html)?,
        source: url.to_string(),
        kind: SourceKind::Web,
    })
}

/// Crawls every page listed in the sitemap. Pages that fail to download are
/// skipped with a reason.
pub async fn load_website(client: &Client, sitemap_url: &str) -> Result<FetchReport, IngestError> {
    let urls = sitemap_urls(client, sitemap_url).await?;
    info!(sitemap = sitemap_url, pages = urls.len(), "crawling sitemap");

    let mut report = FetchReport::default();
    for url in urls {
        match fetch_page(client, &url).await {
            Ok(document) => report.documents.push(document),
            Err(error) => {
                warn!(url = %url, %error, "skipping page");
                report.skipped.push(SkippedSource {
                    source: url,
                    reason: error.to_string(),
                });
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sitemap_locs_are_extracted() {
        let xml = r#"<?xml version="1.0"?>
            <urlset>
              <url><loc>https://example.com/</loc></url>
              <url><loc> https://example.com/projects </loc></url>
            </urlset>"#;
        let urls = parse_sitemap(xml).unwrap();
        assert_eq!(
            urls,
            vec![
                "https://example.com/".to_string(),
                "https://example.com/projects".to_string()
            ]
        );
    }

    #[test]
    fn html_is_reduced_to_visible_text() {
        let html = r#"<html><head><style>body { color: red; }</style>
            <script>console.log("hidden")</script></head>
            <body><!-- nav --><h1>About &amp; Work</h1><p>First line</p>
            <noscript>enable js</noscript><p>Second&nbsp;line</p></body></html>"#;
        let text = strip_html(html).unwrap();
        assert_eq!(text, "About & Work\nFirst line\nSecond line");
    }

    #[test]
    fn nested_entities_decode_once() {
        let text = strip_html("<p>write &amp;lt; for a literal less-than</p>").unwrap();
        assert_eq!(text, "write &lt; for a literal less-than");
    }

    #[test]
    fn empty_page_yields_empty_text() {
        assert_eq!(strip_html("<html><body></body></html>").unwrap(), "");
    }
}
