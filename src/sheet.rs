//! Spreadsheet ingestion and output.
//!
//! Input rows need a `Company name` column; `Website` (or `Company website`),
//! `Country`, `City`, `Province` and `Site address` are optional. Output keeps those columns and adds one column
//! per certifying body holding the URL where the certification was found.

use crate::matcher::CertifyingBody;
use crate::plant::{CrawlState, Plant};
use crate::{utils, CrawlerError, Storage};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::warn;

const PLANT_COLUMNS: [&str; 6] = [
    "Company name",
    "Website",
    "Country",
    "City",
    "Province",
    "Site address",
];
const STATUS_COLUMN: &str = "Status";

#[derive(Debug, Deserialize)]
struct PlantRow {
    #[serde(rename = "Company name")]
    name: String,
    #[serde(rename = "Website", alias = "Company website", default)]
    website: Option<String>,
    #[serde(rename = "Country", default)]
    country: Option<String>,
    #[serde(rename = "City", default)]
    city: Option<String>,
    #[serde(rename = "Province", default)]
    province: Option<String>,
    #[serde(rename = "Site address", default)]
    address: Option<String>,
}

pub fn read_plants<R: io::Read>(reader: R) -> Result<Vec<Plant>, CrawlerError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut seen = HashSet::new();
    let mut plants = vec![];
    for row in rdr.deserialize::<PlantRow>() {
        let row = row?;
        if row.name.is_empty() {
            warn!("Skip row without company name");
            continue;
        }
        if !seen.insert(row.name.clone()) {
            warn!("Skip duplicate plant {}", row.name);
            continue;
        }
        plants.push(Plant {
            name: row.name,
            website: utils::non_blank(row.website),
            country: utils::non_blank(row.country),
            city: utils::non_blank(row.city),
            province: utils::non_blank(row.province),
            address: utils::non_blank(row.address),
        });
    }
    Ok(plants)
}

pub fn read_plants_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Plant>, CrawlerError> {
    read_plants(File::open(path)?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub plant: Plant,
    /// `None` for plants that were never crawled.
    pub state: Option<CrawlState>,
    pub matches: BTreeMap<CertifyingBody, String>,
}

/// Builds one output row per input plant from what the sink holds. Fields
/// found by discovery fill empty input cells.
pub async fn rows_from_storage<S>(storage: &S, plants: &[Plant]) -> Result<Vec<OutputRow>, CrawlerError>
where
    S: Storage + ?Sized,
{
    let mut rows = Vec::with_capacity(plants.len());
    for plant in plants {
        let finished = storage.finished_get(&plant.name).await?;
        let matches = storage
            .results_get(&plant.name)
            .await?
            .into_iter()
            .map(|r| (r.certifying_body, r.url))
            .collect();

        let mut plant = plant.clone();
        if let Some(crawled) = finished.as_ref().map(|f| &f.plant) {
            fill_missing(&mut plant.website, &crawled.website);
            fill_missing(&mut plant.country, &crawled.country);
            fill_missing(&mut plant.city, &crawled.city);
            fill_missing(&mut plant.province, &crawled.province);
            fill_missing(&mut plant.address, &crawled.address);
        }
        rows.push(OutputRow {
            plant,
            state: finished.map(|f| f.state),
            matches,
        });
    }
    Ok(rows)
}

fn fill_missing(field: &mut Option<String>, found: &Option<String>) {
    if field.is_none() {
        field.clone_from(found);
    }
}

fn header() -> Vec<&'static str> {
    PLANT_COLUMNS
        .into_iter()
        .chain(CertifyingBody::ALL.iter().map(CertifyingBody::column))
        .chain([STATUS_COLUMN])
        .collect()
}

fn plant_fields(plant: &Plant) -> Vec<String> {
    [
        Some(plant.name.clone()),
        plant.website.clone(),
        plant.country.clone(),
        plant.city.clone(),
        plant.province.clone(),
        plant.address.clone(),
    ]
    .into_iter()
    .map(Option::unwrap_or_default)
    .collect()
}

/// One row per plant, every certifying body in its own column.
pub fn write_rows<W: io::Write>(writer: W, rows: &[OutputRow]) -> Result<(), CrawlerError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header())?;
    for row in rows {
        let mut fields = plant_fields(&row.plant);
        fields.extend(
            CertifyingBody::ALL
                .iter()
                .map(|body| row.matches.get(body).cloned().unwrap_or_default()),
        );
        fields.push(row.state.map(|s| s.to_string()).unwrap_or_default());
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}

/// One row per (plant, certifying body) match, with only that body's column
/// filled. Plants without any match produce no row.
pub fn write_split_rows<W: io::Write>(writer: W, rows: &[OutputRow]) -> Result<(), CrawlerError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(header())?;
    for row in rows {
        for (matched, url) in &row.matches {
            let mut fields = plant_fields(&row.plant);
            fields.extend(CertifyingBody::ALL.iter().map(|body| {
                if body == matched {
                    url.clone()
                } else {
                    String::new()
                }
            }));
            fields.push(row.state.map(|s| s.to_string()).unwrap_or_default());
            wtr.write_record(&fields)?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_output<P: AsRef<Path>>(path: P, rows: &[OutputRow], split: bool) -> Result<(), CrawlerError> {
    let file = File::create(path)?;
    if split {
        write_split_rows(file, rows)
    } else {
        write_rows(file, rows)
    }
}
