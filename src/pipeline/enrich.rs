//! Item enrichment
//!
//! Fills the gaps in parsed paper records. Items missing required fields get
//! a secondary metadata lookup keyed by their link (bounded concurrency, to
//! respect third-party rate limits); whatever is still missing afterwards is
//! synthesized from the fields at hand so no record ever ships with an empty
//! summary or description. Synthesis keeps the two fields distinct: the
//! summary says why a paper matters, the description says what it covers.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::models::{EnrichedItem, Entity, LinkMetadata};
use crate::parser::ParsedItem;
use crate::providers::{Capability, MetadataFetch};

pub struct EnrichmentOutcome {
    pub items: Vec<EnrichedItem>,
    pub degraded: bool,
    pub reasons: Vec<String>,
}

fn needs_lookup(item: &ParsedItem) -> bool {
    item.link.is_some()
        && (item.summary.is_none()
            || item.description.is_none()
            || item.authors.is_none()
            || item.external_ids.is_empty())
}

fn normalized(text: &str) -> String {
    text.trim().to_lowercase()
}

fn synthesize_summary(title: &str, entity: &Entity) -> String {
    format!(
        "Highlights how \"{}\" informs ongoing work on {}.",
        title, entity.display_name
    )
}

fn synthesize_description(item: &ParsedItem) -> String {
    let mut parts = Vec::new();
    if let Some(authors) = &item.authors {
        parts.push(format!("by {}", authors));
    }
    if let Some(year) = item.year {
        parts.push(format!("published {}", year));
    }
    if let Some(venue) = &item.venue {
        parts.push(format!("in {}", venue));
    }
    let title = item.title.as_deref().unwrap_or("this work");
    if parts.is_empty() {
        format!("A publication titled \"{}\"; no abstract was available.", title)
    } else {
        format!("\"{}\", {}.", title, parts.join(", "))
    }
}

pub async fn enrich_items(
    parsed: Vec<ParsedItem>,
    entity: &Entity,
    metadata: &Arc<dyn MetadataFetch>,
    concurrency: usize,
) -> EnrichmentOutcome {
    let mut reasons = Vec::new();
    let mut degraded = false;

    let fetch_allowed = metadata.is_available();
    if !fetch_allowed && parsed.iter().any(needs_lookup) {
        degraded = true;
        reasons.push(format!(
            "{} fell back: metadata provider unavailable, synthesizing missing fields",
            Capability::MetadataFetch
        ));
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    // Secondary fetches run concurrently; results are merged back by item
    // index, never by completion order.
    let lookups = parsed.iter().enumerate().map(|(index, item)| {
        let semaphore = Arc::clone(&semaphore);
        let metadata = Arc::clone(metadata);
        let link = item.link.clone();
        let wanted = fetch_allowed && needs_lookup(item);
        async move {
            if !wanted {
                return (index, None, None);
            }
            let Some(link) = link else {
                return (index, None, None);
            };
            let Ok(_permit) = semaphore.acquire().await else {
                return (index, None, None);
            };
            debug!(index, link = %link, "Enrichment lookup");
            let result = metadata.fetch(&link).await;
            match result.outcome {
                Ok(found) => (index, Some(found), None),
                Err(failure) => (
                    index,
                    None,
                    Some(format!(
                        "{} fell back for \"{}\": {}",
                        Capability::MetadataFetch, link, failure
                    )),
                ),
            }
        }
    });

    let mut fetched: Vec<Option<LinkMetadata>> = vec![None; parsed.len()];
    for (index, found, reason) in join_all(lookups).await {
        fetched[index] = found;
        if let Some(reason) = reason {
            degraded = true;
            reasons.push(reason);
        }
    }

    let items = parsed
        .into_iter()
        .zip(fetched)
        .filter_map(|(mut item, found)| {
            if let Some(found) = found {
                if item.authors.is_none() {
                    item.authors = found.authors;
                }
                if item.description.is_none() {
                    item.description = found.description;
                }
                if item.venue.is_none() {
                    item.venue = found.external_ids.get("venue").cloned();
                }
                for (id_type, value) in found.external_ids {
                    if id_type != "venue" {
                        item.external_ids.entry(id_type).or_insert(value);
                    }
                }
            }
            finalize(item, entity)
        })
        .collect::<Vec<_>>();

    info!(count = items.len(), degraded, "Enrichment complete");
    EnrichmentOutcome {
        items,
        degraded,
        reasons,
    }
}

/// Turn a parsed record into a fully-populated item, synthesizing whatever
/// is still missing and repairing summary/description collisions.
fn finalize(item: ParsedItem, entity: &Entity) -> Option<EnrichedItem> {
    let title = item.title.clone()?;
    let mut synthesized = false;

    let summary = match &item.summary {
        Some(summary) => summary.clone(),
        None => {
            synthesized = true;
            synthesize_summary(&title, entity)
        }
    };

    let mut description = match &item.description {
        Some(description) => description.clone(),
        None => {
            synthesized = true;
            synthesize_description(&item)
        }
    };

    // The two fields answer different questions; a duplicated value is
    // replaced with distinct synthesized text, never shipped twice.
    if normalized(&summary) == normalized(&description) {
        synthesized = true;
        description = synthesize_description(&item);
        if normalized(&summary) == normalized(&description) {
            description = format!(
                "Full record for \"{}\"; see the linked source for details.",
                title
            );
        }
    }

    Some(EnrichedItem {
        title,
        authors: item.authors,
        venue: item.venue,
        year: item.year,
        external_ids: item.external_ids,
        link: item.link,
        summary,
        description,
        synthesized,
    })
}
