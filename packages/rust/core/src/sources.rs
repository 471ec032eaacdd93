//! Deduplicated, ordered evidence-URL accumulator.

use std::collections::HashSet;

/// Insertion-ordered set of unique evidence URLs for one run.
///
/// Owned by a single flow instance; never shared across concurrent runs, so
/// it carries no synchronization.
#[derive(Debug, Default)]
pub struct SourcesManager {
    urls: Vec<String>,
    seen: HashSet<String>,
}

impl SourcesManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one evidence URL. Duplicates (by exact string) are ignored.
    pub fn add_source(&mut self, url: impl Into<String>) {
        let url = url.into();
        if url.is_empty() {
            return;
        }
        if self.seen.insert(url.clone()) {
            self.urls.push(url);
        }
    }

    /// Record a batch of evidence URLs, preserving iteration order.
    pub fn add_sources<I, S>(&mut self, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for url in urls {
            self.add_source(url);
        }
    }

    /// Final ordered source list: the primary page URL first (exactly once),
    /// then every other URL in insertion order.
    pub fn get_sources(&self, primary_url: &str) -> Vec<String> {
        let mut out = Vec::with_capacity(self.urls.len() + 1);
        out.push(primary_url.to_string());
        for url in &self.urls {
            if url != primary_url {
                out.push(url.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_by_exact_url() {
        let mut sources = SourcesManager::new();
        sources.add_source("https://acme.example/about");
        sources.add_source("https://acme.example/team");
        sources.add_source("https://acme.example/about");

        let out = sources.get_sources("https://acme.example");
        assert_eq!(
            out,
            vec![
                "https://acme.example",
                "https://acme.example/about",
                "https://acme.example/team",
            ]
        );
    }

    #[test]
    fn primary_is_first_and_unique() {
        let mut sources = SourcesManager::new();
        sources.add_sources([
            "https://acme.example/about",
            "https://acme.example",
            "https://news.example/acme",
        ]);

        let out = sources.get_sources("https://acme.example");
        assert_eq!(out[0], "https://acme.example");
        assert_eq!(
            out.iter()
                .filter(|u| u.as_str() == "https://acme.example")
                .count(),
            1
        );
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn empty_manager_yields_primary_only() {
        let sources = SourcesManager::new();
        assert_eq!(
            sources.get_sources("https://acme.example"),
            vec!["https://acme.example"]
        );
    }

    #[test]
    fn empty_urls_are_ignored() {
        let mut sources = SourcesManager::new();
        sources.add_source("");
        assert_eq!(
            sources.get_sources("https://acme.example"),
            vec!["https://acme.example"]
        );
    }
}
