#![allow(dead_code)]

//! Page content fetching and HTML text extraction. A failing fetch returns
//! `None`: competitor scraping tolerates partial failure, and the caller
//! decides whether a missing page is fatal.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::warn;

/// Structured extract of one fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
    pub body_text: String,
    pub word_count: usize,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches and extracts one page. Returns `None` on any failure, never
    /// an error for a single page.
    async fn fetch(&self, url: &str) -> Option<FetchedPage>;
}

pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .user_agent("Mozilla/5.0 (compatible; SitelensBot/1.0)")
                .build()?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Option<FetchedPage> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Failed to fetch {url}: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Fetch of {url} returned {}", response.status());
            return None;
        }

        let html = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read body of {url}: {e}");
                return None;
            }
        };

        Some(extract_content(url, &html))
    }
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("static selector must parse")
}

/// Extracts title, meta description, headings, and visible body text from an
/// HTML document. Content is read from `<main>`, falling back to `<article>`
/// then `<body>`; script/style/noscript/iframe subtrees are excluded.
pub fn extract_content(url: &str, html: &str) -> FetchedPage {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&sel("title"))
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default();

    let meta_description = doc
        .select(&sel(r#"meta[name="description"]"#))
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .trim()
        .to_string();

    let h1 = heading_texts(&doc, "h1");
    let h2 = heading_texts(&doc, "h2");
    let h3 = heading_texts(&doc, "h3");

    let root = doc
        .select(&sel("main"))
        .next()
        .or_else(|| doc.select(&sel("article")).next())
        .or_else(|| doc.select(&sel("body")).next())
        .unwrap_or_else(|| doc.root_element());

    let mut raw = String::new();
    collect_visible_text(root, &mut raw);
    let body_text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let word_count = body_text.split_whitespace().count();

    FetchedPage {
        url: url.to_string(),
        title,
        meta_description,
        h1,
        h2,
        h3,
        body_text,
        word_count,
    }
}

fn heading_texts(doc: &Html, level: &str) -> Vec<String> {
    doc.select(&sel(level))
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect()
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(el) = ElementRef::wrap(child) {
            if matches!(
                el.value().name(),
                "script" | "style" | "noscript" | "iframe"
            ) {
                continue;
            }
            collect_visible_text(el, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"
        <html>
          <head>
            <title>Keyword Research Guide</title>
            <meta name="description" content="How to research keywords.">
            <style>body { color: red; }</style>
          </head>
          <body>
            <nav>Home About</nav>
            <main>
              <h1>Keyword Research</h1>
              <h2>Why it matters</h2>
              <h2>How to start</h2>
              <h3>Tools</h3>
              <p>Research keywords before writing content.</p>
              <script>console.log("tracking")</script>
            </main>
          </body>
        </html>
    "#;

    #[test]
    fn test_extract_title_and_meta() {
        let page = extract_content("https://example.com/guide", FIXTURE);
        assert_eq!(page.title, "Keyword Research Guide");
        assert_eq!(page.meta_description, "How to research keywords.");
        assert_eq!(page.url, "https://example.com/guide");
    }

    #[test]
    fn test_extract_headings_by_level() {
        let page = extract_content("https://example.com", FIXTURE);
        assert_eq!(page.h1, vec!["Keyword Research"]);
        assert_eq!(page.h2, vec!["Why it matters", "How to start"]);
        assert_eq!(page.h3, vec!["Tools"]);
    }

    #[test]
    fn test_extract_prefers_main_and_skips_scripts() {
        let page = extract_content("https://example.com", FIXTURE);
        assert!(page.body_text.contains("Research keywords before writing"));
        // nav is outside <main>; script content is excluded
        assert!(!page.body_text.contains("Home About"));
        assert!(!page.body_text.contains("tracking"));
    }

    #[test]
    fn test_extract_counts_words_of_body_text() {
        let page = extract_content("https://example.com", FIXTURE);
        assert_eq!(page.word_count, page.body_text.split_whitespace().count());
        assert!(page.word_count > 0);
    }

    #[test]
    fn test_extract_falls_back_to_body_without_main() {
        let html = "<html><body><p>plain content here</p></body></html>";
        let page = extract_content("https://example.com", html);
        assert_eq!(page.body_text, "plain content here");
        assert_eq!(page.word_count, 3);
        assert!(page.title.is_empty());
    }
}
