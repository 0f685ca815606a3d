use crate::plant::Plant;
use crate::CrawlerError;
use serde::Deserialize;
use std::cmp::Ordering;
use std::time::Duration;
use tracing::{debug, warn};

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";
const PLACES_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/place";
const RESULTS_CHECKED: usize = 5;
const EXCLUDED_DOMAINS: &[&str] = &[
    "facebook.com",
    "linkedin.com",
    "twitter.com",
    "instagram.com",
    "youtube.com",
];

/// Website and location fields found for a plant. Any of them may be
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    pub website: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub address: Option<String>,
}

impl Discovered {
    /// Copies discovered values into the fields `plant` does not have yet and
    /// returns the names of the fields it filled.
    pub fn fill(&self, plant: &mut Plant) -> Vec<&'static str> {
        let mut filled = vec![];
        for (name, field, found) in [
            ("website", &mut plant.website, &self.website),
            ("country", &mut plant.country, &self.country),
            ("city", &mut plant.city, &self.city),
            ("province", &mut plant.province, &self.province),
            ("address", &mut plant.address, &self.address),
        ] {
            if field.is_none() && found.is_some() {
                field.clone_from(found);
                filled.push(name);
            }
        }
        filled
    }
}

/// Finds what a plant's spreadsheet row is missing. The crawler treats a
/// discovered website like any website read from the spreadsheet.
#[async_trait::async_trait]
pub trait PlantLookup: Send + Sync {
    async fn lookup(&self, plant: &Plant) -> Result<Discovered, CrawlerError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
}

#[derive(Debug, Deserialize)]
struct PlacesResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<PlaceCandidate>,
}

#[derive(Debug, Deserialize)]
struct PlaceCandidate {
    place_id: String,
    #[serde(default)]
    rating: f64,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[serde(default)]
    status: String,
    result: Option<PlaceDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetails {
    formatted_address: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl PlaceDetails {
    fn into_discovered(self) -> Discovered {
        let mut found = Discovered {
            address: self.formatted_address,
            ..Default::default()
        };
        for component in self.address_components {
            let has = |t: &str| component.types.iter().any(|c| c == t);
            if has("country") {
                found.country = Some(component.long_name);
            } else if has("locality") {
                found.city = Some(component.long_name);
            } else if has("administrative_area_level_1") {
                found.province = Some(component.long_name);
            }
        }
        found
    }
}

/// Web search query: every known field of the plant, space separated.
pub fn search_query(plant: &Plant) -> String {
    [
        Some(&plant.name),
        plant.country.as_ref(),
        plant.city.as_ref(),
        plant.province.as_ref(),
        plant.address.as_ref(),
    ]
    .into_iter()
    .flatten()
    .map(|s| s.trim())
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Places query: name, then city and country when known.
pub fn places_query(plant: &Plant) -> String {
    [Some(&plant.name), plant.city.as_ref(), plant.country.as_ref()]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// First of the top results that is not a social network page.
pub fn pick_website<'a, I>(links: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    links
        .into_iter()
        .take(RESULTS_CHECKED)
        .find(|link| {
            let link = link.to_ascii_lowercase();
            !EXCLUDED_DOMAINS.iter().any(|d| link.contains(d))
        })
        .map(ToString::to_string)
}

/// Highest rated candidate, the earliest one on ties. Unrated places count as
/// zero.
fn best_place(candidates: &[PlaceCandidate]) -> Option<&PlaceCandidate> {
    candidates
        .iter()
        .enumerate()
        .max_by(|(i, a), (j, b)| {
            a.rating
                .partial_cmp(&b.rating)
                .unwrap_or(Ordering::Equal)
                .then(j.cmp(i))
        })
        .map(|(_, place)| place)
}

fn check_status(api: &str, status: &str) -> Result<(), CrawlerError> {
    match status {
        "" | "OK" | "ZERO_RESULTS" => Ok(()),
        other => Err(CrawlerError::LookupError(format!("{} returned {}", api, other))),
    }
}

/// Google Custom Search for websites and Google Places for location fields.
#[derive(Debug, Clone)]
pub struct GoogleLookup {
    client: reqwest::Client,
    search_endpoint: String,
    places_endpoint: String,
    api_key: String,
    cse_id: String,
}

impl GoogleLookup {
    pub fn new(api_key: &str, cse_id: &str, timeout: Duration) -> Result<Self, CrawlerError> {
        if api_key.trim().is_empty() || cse_id.trim().is_empty() {
            return Err(CrawlerError::ConfigurationError(
                "Google API key and search engine id are required".to_string(),
            ));
        }
        Ok(GoogleLookup {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            search_endpoint: SEARCH_ENDPOINT.to_string(),
            places_endpoint: PLACES_ENDPOINT.to_string(),
            api_key: api_key.to_string(),
            cse_id: cse_id.to_string(),
        })
    }

    pub fn with_endpoints<S: Into<String>, P: Into<String>>(mut self, search: S, places: P) -> Self {
        self.search_endpoint = search.into();
        self.places_endpoint = places.into();
        self
    }

    pub async fn find_website(&self, plant: &Plant) -> Result<Option<String>, CrawlerError> {
        let query = search_query(plant);
        debug!("Search website for {}", query);

        let response: SearchResponse = self
            .client
            .get(&self.search_endpoint)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cse_id.as_str()),
                ("q", query.as_str()),
                ("num", "5"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(pick_website(response.items.iter().map(|i| i.link.as_str())))
    }

    pub async fn find_location(&self, plant: &Plant) -> Result<Option<Discovered>, CrawlerError> {
        let query = places_query(plant);
        debug!("Search place for {}", query);

        let places: PlacesResponse = self
            .client
            .get(format!("{}/textsearch/json", self.places_endpoint))
            .query(&[("query", query.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check_status("Places text search", &places.status)?;

        let Some(best) = best_place(&places.results) else {
            return Ok(None);
        };
        debug!(place_id = %best.place_id, rating = best.rating, "Best place");

        let details: DetailsResponse = self
            .client
            .get(format!("{}/details/json", self.places_endpoint))
            .query(&[
                ("place_id", best.place_id.as_str()),
                ("fields", "formatted_address,address_components"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        check_status("Places details", &details.status)?;

        Ok(details.result.map(PlaceDetails::into_discovered))
    }
}

#[async_trait::async_trait]
impl PlantLookup for GoogleLookup {
    async fn lookup(&self, plant: &Plant) -> Result<Discovered, CrawlerError> {
        let mut found = Discovered::default();
        let mut enriched = plant.clone();

        let location_missing = plant.country.is_none()
            || plant.city.is_none()
            || plant.province.is_none()
            || plant.address.is_none();
        if location_missing {
            match self.find_location(plant).await {
                Ok(Some(location)) => {
                    location.fill(&mut enriched);
                    found = location;
                }
                Ok(None) => debug!(plant = %plant.name, "No place found"),
                Err(e) => warn!(plant = %plant.name, "Place lookup failed: {}", e),
            }
        }

        if plant.website.is_none() {
            found.website = self.find_website(&enriched).await?;
        }
        Ok(found)
    }
}
