//! Metadata-by-link fetch
//!
//! Fills in authors and descriptions for parsed papers during enrichment.
//! Route selection by URL shape: PubMed links go through the E-utilities
//! efetch API, DOI links through CrossRef, everything else through a
//! best-effort scrape of `citation_*` meta tags.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::LinkMetadata;
use crate::providers::{classify_status, classify_transport, timed, MetadataFetch};
use crate::types::{ProviderErrorKind, ProviderFailure, ProviderResult};

const PROVIDER: &str = "metadata-fetch";
const MAX_DESCRIPTION_CHARS: usize = 500;

pub struct MetadataClient {
    client: reqwest::Client,
    timeout: Duration,
    crossref_base: String,
    eutils_base: String,
}

#[derive(Debug, Deserialize)]
struct CrossRefResponse {
    message: CrossRefWork,
}

#[derive(Debug, Deserialize)]
struct CrossRefWork {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<CrossRefAuthor>,
    #[serde(default, rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(default, rename = "container-title")]
    container_title: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CrossRefAuthor {
    #[serde(default)]
    given: Option<String>,
    #[serde(default)]
    family: Option<String>,
}

impl MetadataClient {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            crossref_base: "https://api.crossref.org".to_string(),
            eutils_base: "https://eutils.ncbi.nlm.nih.gov".to_string(),
        }
    }

    #[cfg(test)]
    fn with_bases(mut self, crossref: String, eutils: String) -> Self {
        self.crossref_base = crossref;
        self.eutils_base = eutils;
        self
    }

    async fn fetch_inner(&self, url: &str) -> Result<LinkMetadata, ProviderFailure> {
        if url.contains("pubmed.ncbi.nlm.nih.gov") || url.contains("ncbi.nlm.nih.gov/pubmed") {
            if let Some(pmid) = extract_pmid(url) {
                return self.fetch_pubmed(&pmid).await;
            }
        }
        if let Some(doi) = extract_doi(url) {
            return self.fetch_crossref(&doi).await;
        }
        self.fetch_generic(url).await
    }

    async fn fetch_pubmed(&self, pmid: &str) -> Result<LinkMetadata, ProviderFailure> {
        let url = format!(
            "{}/entrez/eutils/efetch.fcgi?db=pubmed&id={}&retmode=xml&rettype=abstract",
            self.eutils_base, pmid
        );
        debug!(pmid = %pmid, "Fetching PubMed record");
        let body = self.get_text(&url).await?;

        let mut metadata = parse_pubmed_xml(&body);
        metadata
            .external_ids
            .insert("pmid".to_string(), pmid.to_string());
        Ok(metadata)
    }

    async fn fetch_crossref(&self, doi: &str) -> Result<LinkMetadata, ProviderFailure> {
        let url = format!("{}/works/{}", self.crossref_base, doi);
        debug!(doi = %doi, "Fetching CrossRef record");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &body));
        }

        let parsed: CrossRefResponse = response
            .json()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let work = parsed.message;
        let authors = format_authors(
            work.author
                .iter()
                .filter_map(|a| match (&a.family, &a.given) {
                    (Some(family), Some(given)) => Some(format!("{} {}", given, family)),
                    (Some(family), None) => Some(family.clone()),
                    _ => None,
                })
                .collect(),
        );

        let mut external_ids = HashMap::new();
        external_ids.insert("doi".to_string(), doi.to_string());
        if let Some(venue) = work.container_title.first() {
            external_ids.insert("venue".to_string(), venue.clone());
        }

        Ok(LinkMetadata {
            title: work.title.into_iter().next(),
            authors,
            description: work.abstract_text.map(|a| truncate(&strip_tags(&a))),
            external_ids,
        })
    }

    async fn fetch_generic(&self, url: &str) -> Result<LinkMetadata, ProviderFailure> {
        debug!(url = %url, "Generic metadata scrape");
        let body = self.get_text(url).await?;
        Ok(parse_meta_tags(&body))
    }

    async fn get_text(&self, url: &str) -> Result<String, ProviderFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(PROVIDER, status, &body));
        }
        response
            .text()
            .await
            .map_err(|e| classify_transport(PROVIDER, &e))
    }
}

fn extract_pmid(url: &str) -> Option<String> {
    let re = Regex::new(r"/(\d+)/?\s*$").unwrap();
    re.captures(url.trim_end_matches('/'))
        .map(|c| c[1].to_string())
}

/// DOI pattern: `10.<registrant>/<suffix>`.
pub(crate) fn extract_doi(text: &str) -> Option<String> {
    let re = Regex::new(r#"10\.\d{4,9}/[^\s"<>]+"#).unwrap();
    re.find(text).map(|m| m.as_str().trim_end_matches('.').to_string())
}

fn parse_pubmed_xml(xml: &str) -> LinkMetadata {
    let last_re = Regex::new(r"<LastName>([^<]+)</LastName>\s*<ForeName>([^<]+)</ForeName>").unwrap();
    let names: Vec<String> = last_re
        .captures_iter(xml)
        .map(|c| format!("{} {}", &c[1], &c[2]))
        .collect();

    let abstract_re = Regex::new(r"(?s)<AbstractText[^>]*>(.*?)</AbstractText>").unwrap();
    let description = abstract_re
        .captures(xml)
        .map(|c| truncate(&strip_tags(&c[1])));

    let doi_re = Regex::new(r#"<ELocationID EIdType="doi"[^>]*>([^<]+)</ELocationID>"#).unwrap();
    let mut external_ids = HashMap::new();
    if let Some(c) = doi_re.captures(xml) {
        external_ids.insert("doi".to_string(), c[1].to_string());
    }

    let title_re = Regex::new(r"(?s)<ArticleTitle>(.*?)</ArticleTitle>").unwrap();

    LinkMetadata {
        title: title_re.captures(xml).map(|c| strip_tags(&c[1])),
        authors: format_authors(names),
        description,
        external_ids,
    }
}

fn parse_meta_tags(html: &str) -> LinkMetadata {
    let meta_re = |name: &str| -> Regex {
        Regex::new(&format!(
            r#"(?i)<meta[^>]*name=["']{}["'][^>]*content=["']([^"']+)["']"#,
            name
        ))
        .unwrap()
    };

    let authors: Vec<String> = meta_re("citation_author")
        .captures_iter(html)
        .map(|c| c[1].to_string())
        .collect();
    let authors = if authors.is_empty() {
        meta_re("author")
            .captures(html)
            .map(|c| c[1].to_string())
    } else {
        format_authors(authors)
    };

    let description = meta_re("(?:description|abstract|citation_abstract)")
        .captures(html)
        .map(|c| truncate(&c[1]));

    let mut external_ids = HashMap::new();
    if let Some(c) = meta_re("citation_doi").captures(html) {
        external_ids.insert("doi".to_string(), c[1].to_string());
    }
    if let Some(c) = meta_re("citation_pmid").captures(html) {
        external_ids.insert("pmid".to_string(), c[1].to_string());
    }

    LinkMetadata {
        title: meta_re("citation_title").captures(html).map(|c| c[1].to_string()),
        authors,
        description,
        external_ids,
    }
}

/// Join up to five author names, appending "et al." beyond that.
fn format_authors(names: Vec<String>) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let mut joined = names.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
    if names.len() > 5 {
        joined.push_str(" et al.");
    }
    Some(joined)
}

fn strip_tags(text: &str) -> String {
    let tag_re = Regex::new(r"<[^>]+>").unwrap();
    let ws_re = Regex::new(r"\s+").unwrap();
    ws_re
        .replace_all(&tag_re.replace_all(text, " "), " ")
        .trim()
        .to_string()
}

fn truncate(text: &str) -> String {
    if text.chars().count() > MAX_DESCRIPTION_CHARS {
        let cut: String = text.chars().take(MAX_DESCRIPTION_CHARS).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[async_trait]
impl MetadataFetch for MetadataClient {
    fn is_available(&self) -> bool {
        // CrossRef and E-utilities need no credential.
        true
    }

    async fn fetch(&self, url: &str) -> ProviderResult<LinkMetadata> {
        if url.is_empty() {
            return ProviderResult::failure(
                PROVIDER,
                ProviderFailure::new(PROVIDER, ProviderErrorKind::NotFound, "empty url"),
            );
        }
        let result = timed(PROVIDER, self.timeout, self.fetch_inner(url)).await;
        if let Err(failure) = &result.outcome {
            warn!(url = %url, error = %failure, "Metadata fetch failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doi_extraction() {
        assert_eq!(
            extract_doi("https://doi.org/10.1234/example-1"),
            Some("10.1234/example-1".to_string())
        );
        assert_eq!(extract_doi("no doi here"), None);
    }

    #[test]
    fn pmid_extraction() {
        assert_eq!(
            extract_pmid("https://pubmed.ncbi.nlm.nih.gov/12345678/"),
            Some("12345678".to_string())
        );
        assert_eq!(extract_pmid("https://pubmed.ncbi.nlm.nih.gov/"), None);
    }

    #[test]
    fn pubmed_xml_parsing() {
        let xml = r#"
            <PubmedArticle>
              <ArticleTitle>Insulin signalling revisited</ArticleTitle>
              <Author><LastName>Smith</LastName><ForeName>Ada</ForeName></Author>
              <Author><LastName>Jones</LastName><ForeName>Ben</ForeName></Author>
              <AbstractText>Insulin regulates glucose uptake.</AbstractText>
              <ELocationID EIdType="doi">10.1000/j.test.1</ELocationID>
            </PubmedArticle>"#;
        let metadata = parse_pubmed_xml(xml);
        assert_eq!(metadata.title.as_deref(), Some("Insulin signalling revisited"));
        assert_eq!(metadata.authors.as_deref(), Some("Smith Ada, Jones Ben"));
        assert_eq!(
            metadata.description.as_deref(),
            Some("Insulin regulates glucose uptake.")
        );
        assert_eq!(
            metadata.external_ids.get("doi").map(String::as_str),
            Some("10.1000/j.test.1")
        );
    }

    #[test]
    fn meta_tag_parsing() {
        let html = r#"
            <html><head>
              <meta name="citation_title" content="A Study" />
              <meta name="citation_author" content="Ada Smith" />
              <meta name="citation_author" content="Ben Jones" />
              <meta name="citation_doi" content="10.1000/x.1" />
              <meta name="description" content="What the paper covers." />
            </head></html>"#;
        let metadata = parse_meta_tags(html);
        assert_eq!(metadata.title.as_deref(), Some("A Study"));
        assert_eq!(metadata.authors.as_deref(), Some("Ada Smith, Ben Jones"));
        assert_eq!(metadata.description.as_deref(), Some("What the paper covers."));
        assert_eq!(
            metadata.external_ids.get("doi").map(String::as_str),
            Some("10.1000/x.1")
        );
    }

    #[tokio::test]
    async fn crossref_route_maps_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/works/10.1234/demo")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"message":{"title":["Demo Work"],
                    "author":[{"given":"Ada","family":"Smith"}],
                    "abstract":"<p>An abstract.</p>",
                    "container-title":["Demo Journal"]}}"#,
            )
            .create_async()
            .await;

        let client = MetadataClient::new(reqwest::Client::new(), Duration::from_secs(5))
            .with_bases(server.url(), server.url());
        let result = client.fetch("https://doi.org/10.1234/demo").await;
        let metadata = result.outcome.expect("crossref fetch");
        assert_eq!(metadata.title.as_deref(), Some("Demo Work"));
        assert_eq!(metadata.authors.as_deref(), Some("Ada Smith"));
        assert_eq!(metadata.description.as_deref(), Some("An abstract."));
        assert_eq!(
            metadata.external_ids.get("venue").map(String::as_str),
            Some("Demo Journal")
        );
    }

    #[test]
    fn author_overflow_gets_et_al() {
        let names: Vec<String> = (1..=7).map(|i| format!("Author {}", i)).collect();
        let formatted = format_authors(names).unwrap();
        assert!(formatted.ends_with("et al."));
        assert!(formatted.contains("Author 5"));
        assert!(!formatted.contains("Author 6"));
    }
}
