//! Citation extraction
//!
//! Agent output is asked to carry a numbered citation list in the form
//! `[n] Title - url`. Numbers deduplicate first-occurrence-wins. When no
//! bracketed citations exist at all, every bare URL in the document is
//! collected and numbered sequentially instead.

use std::collections::HashSet;

use regex::Regex;

use crate::models::Citation;

/// Trailing punctuation that markdown and prose tend to glue onto URLs.
fn clean_url(url: &str) -> String {
    url.trim_end_matches([')', ']', ',', '.', ';']).to_string()
}

pub fn extract_citations(text: &str, cap: usize) -> Vec<Citation> {
    let bracketed = Regex::new(r"\[(\d+)\]\s*(.+?)\s*-\s*(https?://\S+)").unwrap();

    let mut citations = Vec::new();
    let mut seen = HashSet::new();

    for line in text.lines() {
        if citations.len() >= cap {
            break;
        }
        if let Some(captures) = bracketed.captures(line) {
            let number = captures[1].to_string();
            if !seen.insert(number.clone()) {
                continue;
            }
            citations.push(Citation {
                number,
                title: captures[2].trim().to_string(),
                url: clean_url(&captures[3]),
            });
        }
    }

    if !citations.is_empty() {
        return citations;
    }

    // No bracketed citations anywhere; fall back to bare URLs.
    let bare = Regex::new(r"https?://\S+").unwrap();
    let mut seen_urls = HashSet::new();
    for line in text.lines() {
        if citations.len() >= cap {
            break;
        }
        if let Some(m) = bare.find(line) {
            let url = clean_url(m.as_str());
            if !seen_urls.insert(url.clone()) {
                continue;
            }
            let title = line.replace(m.as_str(), "").trim().to_string();
            citations.push(Citation {
                number: (citations.len() + 1).to_string(),
                title: if title.is_empty() {
                    "Untitled source".to_string()
                } else {
                    title
                },
                url,
            });
        }
    }

    citations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_citations_are_parsed() {
        let text = "CITATIONS\n[1] Demo Paper - http://example.com/1\n[2] Other Paper - https://example.com/2\n";
        let citations = extract_citations(text, 15);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].number, "1");
        assert_eq!(citations[0].title, "Demo Paper");
        assert_eq!(citations[0].url, "http://example.com/1");
    }

    #[test]
    fn duplicate_numbers_keep_first_occurrence() {
        let text = "[1] Title X - http://a\nsome text\n[1] Title Y - http://b\n";
        let citations = extract_citations(text, 15);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].title, "Title X");
        assert_eq!(citations[0].url, "http://a");
    }

    #[test]
    fn bare_urls_number_sequentially_when_no_brackets() {
        let text = "See the entry at https://www.uniprot.org/P01308 for details.\nAlso https://pubmed.ncbi.nlm.nih.gov/123/.\n";
        let citations = extract_citations(text, 15);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].number, "1");
        assert_eq!(citations[1].number, "2");
        assert_eq!(citations[1].url, "https://pubmed.ncbi.nlm.nih.gov/123");
    }

    #[test]
    fn citation_count_is_capped() {
        let mut text = String::new();
        for i in 1..=30 {
            text.push_str(&format!("[{}] Paper {} - http://example.com/{}\n", i, i, i));
        }
        let citations = extract_citations(&text, 15);
        assert_eq!(citations.len(), 15);
    }

    #[test]
    fn trailing_punctuation_is_stripped_from_urls() {
        let text = "[1] A Paper - https://doi.org/10.1/x.\n";
        let citations = extract_citations(text, 15);
        assert_eq!(citations[0].url, "https://doi.org/10.1/x");
    }

    #[test]
    fn extraction_is_idempotent() {
        let text = "[1] Demo - http://a\n[2] Other - http://b\n";
        let first = extract_citations(text, 15);
        let second = extract_citations(text, 15);
        assert_eq!(first, second);
    }
}
