//! Agent output parser
//!
//! Converts the free-text research document into typed sections, a citation
//! list, and per-paper records. The grammar is deliberately narrow: section
//! headers are standalone lines matched case-insensitively against a
//! caller-supplied plan, and paper fields are `Label: value` lines. The
//! parser is pure and does no I/O; it never fabricates text, and missing
//! sections are reported as absent rather than as errors.

pub mod citations;

pub use citations::extract_citations;

use std::collections::HashMap;

use regex::Regex;

use crate::models::Citation;

/// Parsed agent output: ordered sections plus the citation list.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionedDocument {
    pub sections: Vec<(String, String)>,
    pub citations: Vec<Citation>,
}

impl SectionedDocument {
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, text)| text.as_str())
    }
}

/// Registered field labels for item extraction. Presentation conventions
/// live here as data, not in the extraction logic.
#[derive(Debug, Clone)]
pub struct FieldLabels {
    pub title: Vec<String>,
    pub authors: Vec<String>,
    pub venue: Vec<String>,
    pub year: Vec<String>,
    pub link: Vec<String>,
    pub summary: Vec<String>,
    pub description: Vec<String>,
    /// (label, id_type) pairs collected into `external_ids`.
    pub external_ids: Vec<(String, String)>,
}

impl Default for FieldLabels {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            title: owned(&["Title"]),
            authors: owned(&["Authors", "Author"]),
            venue: owned(&["Journal", "Venue", "Publication"]),
            year: owned(&["Year"]),
            link: owned(&["Link", "Hyperlink", "URL"]),
            summary: owned(&["Summary"]),
            description: owned(&["Description", "Abstract"]),
            external_ids: vec![
                ("DOI".to_string(), "doi".to_string()),
                ("PMID".to_string(), "pmid".to_string()),
            ],
        }
    }
}

/// A paper record as it appears in the text, before enrichment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedItem {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub venue: Option<String>,
    pub year: Option<i32>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub external_ids: HashMap<String, String>,
}

/// Split the document into the sections the caller expects, in the order it
/// expects them. Each slot closes when the next expected header appears, so
/// text belonging to a later section never leaks into an earlier slice.
/// Missing sections simply produce no entry.
pub fn parse_sections(text: &str, section_plan: &[String], citation_cap: usize) -> SectionedDocument {
    let mut sections = Vec::new();
    for (index, name) in section_plan.iter().enumerate() {
        let next = section_plan.get(index + 1).map(String::as_str);
        if let Some(body) = extract_section(text, name, next) {
            sections.push((name.clone(), body));
        }
    }

    SectionedDocument {
        sections,
        citations: extract_citations(text, citation_cap),
    }
}

/// Extract one named section: opens at the first line containing `name`
/// (case-insensitive), closes at the first following line containing
/// `next_name`, or at end of document. Re-entry is not supported.
fn extract_section(text: &str, name: &str, next_name: Option<&str>) -> Option<String> {
    let name_upper = name.to_uppercase();
    let next_upper = next_name.map(str::to_uppercase);

    let mut collected: Vec<&str> = Vec::new();
    let mut in_section = false;

    for line in text.lines() {
        let line_upper = line.to_uppercase();
        if !in_section {
            if line_upper.contains(&name_upper) {
                in_section = true;
            }
            continue;
        }
        if let Some(next) = &next_upper {
            if line_upper.contains(next) {
                break;
            }
        }
        collected.push(line);
    }

    let body = collected.join("\n").trim().to_string();
    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

/// Strip markdown emphasis markers around a field value.
fn strip_markup(value: &str) -> String {
    value
        .replace("**", "")
        .replace("__", "")
        .trim_matches(|c| c == '*' || c == '_' || c == '`')
        .trim()
        .to_string()
}

fn label_matches(labels: &[String], candidate: &str) -> bool {
    labels.iter().any(|l| l.eq_ignore_ascii_case(candidate))
}

/// Extract paper records from one section. Items are delimited by blank
/// lines or by a new title label; fields arrive in any order and any may be
/// absent. Records with no title at all are discarded as noise.
pub fn parse_items(section_text: &str, labels: &FieldLabels) -> Vec<ParsedItem> {
    // Optional list marker, then "Label: value".
    let field_re = Regex::new(r"^\s*(?:[-*]\s*|\d+[.)]\s*)?\**([A-Za-z][A-Za-z /]*?)\**\s*:\s*(.+)$")
        .unwrap();

    let mut items = Vec::new();
    let mut current = ParsedItem::default();
    let mut current_has_fields = false;

    let mut flush = |item: &mut ParsedItem, has_fields: &mut bool, items: &mut Vec<ParsedItem>| {
        if *has_fields && item.title.is_some() {
            items.push(std::mem::take(item));
        } else {
            *item = ParsedItem::default();
        }
        *has_fields = false;
    };

    for line in section_text.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut current_has_fields, &mut items);
            continue;
        }

        let Some(captures) = field_re.captures(line) else {
            continue;
        };
        let label = captures[1].trim();
        let value = strip_markup(captures[2].trim());
        if value.is_empty() {
            continue;
        }

        if label_matches(&labels.title, label) {
            // A second title opens the next record.
            if current.title.is_some() {
                flush(&mut current, &mut current_has_fields, &mut items);
            }
            current.title = Some(value);
            current_has_fields = true;
        } else if label_matches(&labels.authors, label) {
            current.authors = Some(value);
            current_has_fields = true;
        } else if label_matches(&labels.venue, label) {
            current.venue = Some(value);
            current_has_fields = true;
        } else if label_matches(&labels.year, label) {
            // Implausible years are discarded as noise.
            if let Ok(year) = value.parse::<i32>() {
                if (1900..=2100).contains(&year) {
                    current.year = Some(year);
                    current_has_fields = true;
                }
            }
        } else if label_matches(&labels.link, label) {
            current.link = Some(value);
            current_has_fields = true;
        } else if label_matches(&labels.summary, label) {
            current.summary = Some(value);
            current_has_fields = true;
        } else if label_matches(&labels.description, label) {
            current.description = Some(value);
            current_has_fields = true;
        } else if let Some((_, id_type)) = labels
            .external_ids
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
        {
            current.external_ids.insert(id_type.clone(), value);
            current_has_fields = true;
        }
    }
    flush(&mut current, &mut current_has_fields, &mut items);

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<String> {
        vec![
            "ACADEMIC PAPERS".to_string(),
            "USE CASES".to_string(),
            "SUMMARY".to_string(),
        ]
    }

    const DOCUMENT: &str = "\
CITATIONS
[1] Demo Paper - http://example.com/1

ACADEMIC PAPERS
Title: Demo Paper
Year: 2021

USE CASES
Used as a teaching example.

SUMMARY
This is a demo.
";

    #[test]
    fn sections_split_in_expected_order() {
        let doc = parse_sections(DOCUMENT, &plan(), 15);
        assert!(doc.section("ACADEMIC PAPERS").unwrap().contains("Demo Paper"));
        assert_eq!(doc.section("USE CASES"), Some("Used as a teaching example."));
        assert_eq!(doc.section("SUMMARY"), Some("This is a demo."));
    }

    #[test]
    fn section_isolation() {
        let doc = parse_sections(DOCUMENT, &plan(), 15);
        let papers = doc.section("ACADEMIC PAPERS").unwrap();
        assert!(!papers.contains("teaching example"));
        assert!(!papers.contains("This is a demo"));
    }

    #[test]
    fn missing_sections_are_absent_not_errors() {
        let text = "SUMMARY\nOnly a summary here.\n";
        let doc = parse_sections(text, &plan(), 15);
        assert_eq!(doc.section("ACADEMIC PAPERS"), None);
        assert_eq!(doc.section("SUMMARY"), Some("Only a summary here."));
    }

    #[test]
    fn parsing_is_idempotent() {
        let first = parse_sections(DOCUMENT, &plan(), 15);
        let second = parse_sections(DOCUMENT, &plan(), 15);
        assert_eq!(first, second);
    }

    #[test]
    fn items_tolerate_field_order_and_markup() {
        let section = "\
Year: 2020
**Title:** **Bold Paper**
Authors: Ada Smith, Ben Jones

- Title: Listed Paper
- Link: https://example.com/2
- DOI: 10.1/x
";
        let items = parse_items(section, &FieldLabels::default());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title.as_deref(), Some("Bold Paper"));
        assert_eq!(items[0].year, Some(2020));
        assert_eq!(items[0].authors.as_deref(), Some("Ada Smith, Ben Jones"));
        assert_eq!(items[1].title.as_deref(), Some("Listed Paper"));
        assert_eq!(items[1].link.as_deref(), Some("https://example.com/2"));
        assert_eq!(items[1].external_ids.get("doi").map(String::as_str), Some("10.1/x"));
    }

    #[test]
    fn implausible_years_are_discarded() {
        let section = "Title: Odd Paper\nYear: 1742\n";
        let items = parse_items(section, &FieldLabels::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].year, None);
    }

    #[test]
    fn titleless_records_are_dropped() {
        let section = "Authors: Nobody\nYear: 2019\n";
        let items = parse_items(section, &FieldLabels::default());
        assert!(items.is_empty());
    }

    #[test]
    fn second_title_without_blank_line_starts_new_item() {
        let section = "Title: First\nYear: 2001\nTitle: Second\nYear: 2002\n";
        let items = parse_items(section, &FieldLabels::default());
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].year, Some(2001));
        assert_eq!(items[1].year, Some(2002));
    }

    #[test]
    fn summary_and_description_come_from_distinct_labels() {
        let section = "Title: P\nSummary: why it matters\nDescription: what it is\n";
        let items = parse_items(section, &FieldLabels::default());
        assert_eq!(items[0].summary.as_deref(), Some("why it matters"));
        assert_eq!(items[0].description.as_deref(), Some("what it is"));
    }
}
