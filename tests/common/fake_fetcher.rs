use async_trait::async_trait;
use dpofinder::fetcher::{FetchError, FetchedPage, PageFetcher};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

/// In-memory `PageFetcher`: serves registered pages, 404s everything else,
/// and records every requested URL.
#[derive(Default)]
pub struct FakeFetcher {
    pages: HashMap<String, FetchedPage>,
    calls: Mutex<Vec<String>>,
    delay: Duration,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        let parsed = Url::parse(url).expect("fake page URL must parse");
        self.pages.insert(parsed.to_string(), FetchedPage::html(parsed, html));
        self
    }

    pub fn with_typed_page(mut self, url: &str, content_type: &str, body: &str) -> Self {
        let parsed = Url::parse(url).expect("fake page URL must parse");
        self.pages.insert(
            parsed.to_string(),
            FetchedPage {
                url: parsed,
                content_type: Some(content_type.to_string()),
                body: body.to_string(),
            },
        );
        self
    }

    /// Serve `to`'s page (with `to` as its final URL) when `from` is requested.
    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        let from = Url::parse(from).expect("fake redirect URL must parse");
        let target = Url::parse(to).expect("fake redirect URL must parse");
        if let Some(page) = self.pages.get(target.as_str()).cloned() {
            self.pages.insert(from.to_string(), page);
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for_host(&self, host: &str) -> usize {
        self.calls()
            .iter()
            .filter(|u| Url::parse(u).ok().and_then(|u| u.host_str().map(|h| h == host)).unwrap_or(false))
            .count()
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.pages.get(url.as_str()) {
            Some(page) => Ok(page.clone()),
            None => Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
