pub mod extract;
pub mod fetch;
pub mod frontier;

pub use extract::{extract, Extracted};
pub use fetch::{Fetched, Fetcher};
pub use frontier::{clean_website, normalize_url, CrawlTask, DocumentKind, Frontier};

use crate::config::CrawlerConfig;
use crate::matcher::{CertifyingBody, Matcher};
use crate::plant::{CrawlState, FailedFetch, Plant, PlantReport};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Crawls one plant's website until every certifying body is matched, the
/// frontier runs dry or the visit budget is spent.
pub async fn crawl_plant(
    plant: Plant,
    fetcher: &Fetcher,
    matcher: &Matcher,
    config: &CrawlerConfig,
) -> PlantReport {
    let mut report = PlantReport::new(plant);

    let frontier = report
        .plant
        .website
        .as_deref()
        .and_then(clean_website)
        .and_then(|homepage| Frontier::seed(homepage, config.max_depth, config.max_pages));
    let Some(mut frontier) = frontier else {
        info!(plant = %report.plant.name, "No usable website, nothing to crawl");
        report.exhaust();
        return report;
    };

    let mut pending: BTreeSet<CertifyingBody> = CertifyingBody::ALL.into_iter().collect();
    let mut in_flight = FuturesUnordered::new();

    loop {
        while in_flight.len() < config.concurrency.max(1) {
            let Some(task) = frontier.next() else { break };
            in_flight.push(async move {
                let result = fetcher.fetch(&task.url).await;
                (task, result)
            });
        }

        let Some((task, result)) = in_flight.next().await else {
            break;
        };
        report.visited += 1;

        let fetched = match result {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(plant = %report.plant.name, url = %task.url, %error, "Fetch failed");
                report.failures.push(FailedFetch {
                    url: task.url.to_string(),
                    error,
                });
                continue;
            }
        };
        frontier.mark_seen(&fetched.url);
        if task.depth == 0 && frontier.rebase_site(&fetched.url) {
            info!(plant = %report.plant.name, url = %fetched.url, "Homepage moved to another host");
        }

        let Some(kind) = fetched.kind() else {
            debug!(url = %fetched.url, content_type = ?fetched.content_type, "Skip unsupported document");
            continue;
        };

        let page_url = fetched.url.clone();
        let extracted = extract(kind, fetched).await;

        for (body, keyword) in matcher.find(&extracted.text, &pending) {
            if report.record(body, page_url.as_str()) {
                pending.remove(&body);
                info!(
                    plant = %report.plant.name,
                    url = %page_url,
                    depth = task.depth,
                    %body,
                    keyword,
                    "Certification found"
                );
            }
        }
        if report.state == CrawlState::Complete {
            break;
        }

        // The detected kind wins over the URL guess, a PDF served from an
        // extensionless URL is still a leaf.
        let task = CrawlTask { kind, ..task };
        let added = frontier.expand(&task, extracted.links);
        debug!(url = %page_url, depth = task.depth, added, "Expanded");
    }

    if frontier.budget_spent() && !frontier.is_empty() {
        info!(
            plant = %report.plant.name,
            dispatched = frontier.dispatched(),
            dropped = frontier.len(),
            "Visit budget spent"
        );
    }
    report.exhaust();
    info!(
        plant = %report.plant.name,
        state = %report.state,
        matched = report.matches.len(),
        visited = report.visited,
        "Crawl finished"
    );
    report
}
