use crate::error::FetchError;
use crate::matcher::CertifyingBody;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plant {
    pub name: String,
    pub website: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub address: Option<String>,
}

impl Plant {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Plant {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_website<W: Into<String>>(mut self, website: W) -> Self {
        self.website = Some(website.into());
        self
    }

    /// True when the website or any location field is unknown.
    pub fn has_missing_info(&self) -> bool {
        self.website.is_none()
            || self.country.is_none()
            || self.city.is_none()
            || self.province.is_none()
            || self.address.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub plant: String,
    pub certifying_body: CertifyingBody,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// No certifying body matched yet.
    Pending,
    Partial,
    /// Every certifying body matched.
    Complete,
    /// Frontier empty or visit budget spent with some bodies unmatched.
    Exhausted,
}

impl CrawlState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CrawlState::Complete | CrawlState::Exhausted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlState::Pending => "pending",
            CrawlState::Partial => "partial",
            CrawlState::Complete => "complete",
            CrawlState::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrawlState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CrawlState::Pending),
            "partial" => Ok(CrawlState::Partial),
            "complete" => Ok(CrawlState::Complete),
            "exhausted" => Ok(CrawlState::Exhausted),
            _ => Err(format!("Unknown crawl state: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFetch {
    pub url: String,
    pub error: FetchError,
}

/// What the sink remembers about a plant once its crawl has ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedPlant {
    /// The plant as crawled, including fields filled by discovery.
    pub plant: Plant,
    pub state: CrawlState,
    pub visited: u32,
}

/// Outcome of one plant's crawl.
#[derive(Debug, Clone)]
pub struct PlantReport {
    pub plant: Plant,
    pub state: CrawlState,
    pub matches: BTreeMap<CertifyingBody, String>,
    pub visited: usize,
    pub failures: Vec<FailedFetch>,
}

impl PlantReport {
    pub(crate) fn new(plant: Plant) -> Self {
        PlantReport {
            plant,
            state: CrawlState::Pending,
            matches: BTreeMap::new(),
            visited: 0,
            failures: vec![],
        }
    }

    /// Records the first URL found for `body`. Later calls for the same body
    /// are ignored and return `false`.
    pub fn record(&mut self, body: CertifyingBody, url: &str) -> bool {
        if self.state.is_terminal() || self.matches.contains_key(&body) {
            return false;
        }
        self.matches.insert(body, url.to_string());
        self.state = if self.matches.len() == CertifyingBody::ALL.len() {
            CrawlState::Complete
        } else {
            CrawlState::Partial
        };
        true
    }

    pub(crate) fn exhaust(&mut self) {
        if !self.state.is_terminal() {
            self.state = CrawlState::Exhausted;
        }
    }

    pub fn records(&self) -> Vec<MatchRecord> {
        self.matches
            .iter()
            .map(|(body, url)| MatchRecord {
                plant: self.plant.name.clone(),
                certifying_body: *body,
                url: url.clone(),
            })
            .collect()
    }
}
