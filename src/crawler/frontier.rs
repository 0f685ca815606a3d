use std::collections::{HashSet, VecDeque};
use url::Url;

const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Html,
    Pdf,
}

impl DocumentKind {
    /// Guess from the URL alone, before anything is fetched.
    pub fn guess(url: &Url) -> Self {
        if url.path().to_ascii_lowercase().ends_with(".pdf") {
            DocumentKind::Pdf
        } else {
            DocumentKind::Html
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: Url,
    pub depth: u32,
    pub kind: DocumentKind,
}

/// Turns a spreadsheet website cell into a crawlable URL.
pub fn clean_website(website: &str) -> Option<Url> {
    let website = website.trim();
    if website.is_empty() {
        return None;
    }
    let url = if website.contains("://") {
        Url::parse(website).ok()?
    } else {
        Url::parse(&format!("http://{}", website)).ok()?
    };
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    Some(normalize_url(&url))
}

/// Key used for the visited set. Host case and default ports are already
/// normalized by the parser.
pub fn normalize_url(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);

    if url.query().is_some() {
        let kept = url
            .query_pairs()
            .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect::<Vec<_>>();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }
    url
}

fn site_host(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
}

/// Pending crawl tasks of a single plant, breadth first, with the depth limit
/// and visit budget applied.
#[derive(Debug)]
pub struct Frontier {
    /// Hosts considered the plant's own, `www.` stripped.
    sites: Vec<String>,
    queue: VecDeque<CrawlTask>,
    seen: HashSet<String>,
    max_depth: u32,
    budget: usize,
    dispatched: usize,
}

impl Frontier {
    pub fn seed(homepage: Url, max_depth: u32, budget: usize) -> Option<Frontier> {
        let site = site_host(&homepage)?;
        let mut frontier = Frontier {
            sites: vec![site],
            queue: VecDeque::new(),
            seen: HashSet::new(),
            max_depth,
            budget,
            dispatched: 0,
        };
        let homepage = normalize_url(&homepage);
        frontier.seen.insert(homepage.to_string());
        frontier.queue.push_back(CrawlTask {
            kind: DocumentKind::guess(&homepage),
            url: homepage,
            depth: 0,
        });
        Some(frontier)
    }

    pub fn is_same_site(&self, url: &Url) -> bool {
        match site_host(url) {
            Some(host) => self
                .sites
                .iter()
                .any(|site| host == *site || host.ends_with(&format!(".{}", site))),
            None => false,
        }
    }

    /// Accepts the host of `url` as part of the plant's site. Used when the
    /// homepage redirects to another domain. Returns whether the host was new.
    pub fn rebase_site(&mut self, url: &Url) -> bool {
        if self.is_same_site(url) {
            return false;
        }
        match site_host(url) {
            Some(host) => {
                self.sites.push(host);
                true
            }
            None => false,
        }
    }

    /// Marks a URL as visited without queueing it, e.g. the target of a
    /// redirect.
    pub fn mark_seen(&mut self, url: &Url) {
        self.seen.insert(normalize_url(url).to_string());
    }

    /// Queues the links found on `task` one level deeper. HTML links must stay
    /// on the plant's site; PDF links are accepted from any host. PDFs are
    /// leaves and never expand.
    pub fn expand<I>(&mut self, task: &CrawlTask, links: I) -> usize
    where
        I: IntoIterator<Item = Url>,
    {
        let depth = task.depth + 1;
        if task.kind == DocumentKind::Pdf || depth > self.max_depth {
            return 0;
        }

        let mut added = 0;
        for link in links {
            if !matches!(link.scheme(), "http" | "https") {
                continue;
            }
            let url = normalize_url(&link);
            let kind = DocumentKind::guess(&url);
            if kind == DocumentKind::Html && !self.is_same_site(&url) {
                continue;
            }
            if self.seen.insert(url.to_string()) {
                self.queue.push_back(CrawlTask { url, depth, kind });
                added += 1;
            }
        }
        added
    }

    /// Next task to fetch, or `None` once the queue is empty or the visit
    /// budget is spent.
    pub fn next(&mut self) -> Option<CrawlTask> {
        if self.budget_spent() {
            return None;
        }
        let task = self.queue.pop_front()?;
        self.dispatched += 1;
        Some(task)
    }

    pub fn budget_spent(&self) -> bool {
        self.dispatched >= self.budget
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
