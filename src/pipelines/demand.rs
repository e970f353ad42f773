//! Africa's share of global vaccine demand, from the Vaccine Almanac
//! "Demand: Total Required Supply by Country" export.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::config::{Config, DemandConfig};
use crate::countries::ContinentLookup;
use crate::key_numbers::{self, percent, KeyNumbers};
use crate::table::{self, parse_number};

pub const AFRICA: &str = "Africa";
pub const KEY_NUMBER: &str = "africa_share_of_global_vaccine_demand_2030";

#[derive(Debug, Clone, Deserialize)]
pub struct DemandRecord {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Vaccine", default)]
    pub vaccine: String,
    #[serde(rename = "Total Required Supply", default)]
    pub total_required_supply: String,
}

/// One line of the dashed-projection chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AfricaShareRow {
    pub year: i32,
    #[serde(rename = "Africa_share_measured")]
    pub measured: Option<f64>,
    #[serde(rename = "Africa_share_projected")]
    pub projected: Option<f64>,
}

/// Collapse regional rows and apply renames so the name can be looked up.
pub fn normalise_country(name: &str, settings: &DemandConfig) -> String {
    let name = name.trim();
    for (prefix, country) in &settings.collapse_prefixes {
        if name.starts_with(prefix.as_str()) {
            return country.clone();
        }
    }
    settings
        .country_renames
        .get(name)
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

/// Sum required supply by year and continent. Rows whose country has no
/// continent are logged and left out.
pub fn demand_by_year_continent(
    records: &[DemandRecord],
    lookup: &ContinentLookup,
    settings: &DemandConfig,
) -> BTreeMap<i32, BTreeMap<String, f64>> {
    let mut totals: BTreeMap<i32, BTreeMap<String, f64>> = BTreeMap::new();
    let mut unmapped: BTreeMap<String, usize> = BTreeMap::new();

    for record in records {
        let country = normalise_country(&record.country, settings);
        let Some(continent) = lookup.continent(&country) else {
            *unmapped.entry(country).or_default() += 1;
            continue;
        };
        let doses = parse_number(&record.total_required_supply).unwrap_or(0.0);
        *totals
            .entry(record.year)
            .or_default()
            .entry(continent.to_string())
            .or_default() += doses;
    }

    for (country, rows) in &unmapped {
        warn!(country = %country, rows, "no continent for country; rows excluded");
    }
    totals
}

/// Africa's share of each year's total, split into a measured series (up to
/// and including `last_year_measured`) and a projected one (from it onwards).
pub fn africa_share_by_year(
    totals: &BTreeMap<i32, BTreeMap<String, f64>>,
    last_year_measured: i32,
) -> Vec<AfricaShareRow> {
    totals
        .iter()
        .map(|(&year, by_continent)| {
            let total: f64 = by_continent.values().sum();
            let africa = by_continent.get(AFRICA).copied().unwrap_or(0.0);
            let share = (total > 0.0).then(|| africa / total);
            AfricaShareRow {
                year,
                measured: share.filter(|_| year <= last_year_measured),
                projected: share.filter(|_| year >= last_year_measured),
            }
        })
        .collect()
}

pub fn demand_key_numbers(rows: &[AfricaShareRow], key_year: i32) -> Result<KeyNumbers> {
    let share = rows
        .iter()
        .find(|r| r.year == key_year)
        .and_then(|r| r.projected)
        .with_context(|| format!("no projected Africa share for {}", key_year))?;

    let mut out = KeyNumbers::new();
    out.insert(KEY_NUMBER.to_string(), percent(share, 1));
    Ok(out)
}

#[tracing::instrument(level = "info", skip(config))]
pub fn run(config: &Config) -> Result<()> {
    let settings = &config.demand;
    let input = config.raw_file(&settings.input_file);
    let records: Vec<DemandRecord> = table::read_records(&input)?;
    info!(rows = records.len(), input = %input.display(), "loaded vaccine demand");

    let lookup = match &settings.continent_table {
        Some(path) => ContinentLookup::from_path(path)?,
        None => ContinentLookup::builtin()?,
    }
    .with_overrides(&settings.additional_mapping);

    let totals = demand_by_year_continent(&records, &lookup, settings);
    let rows = africa_share_by_year(&totals, settings.last_year_measured);

    let output = config.output_file(&settings.output_file);
    table::write_records(&output, &rows)?;
    info!(rows = rows.len(), output = %output.display(), "wrote demand chart");

    let numbers = demand_key_numbers(&rows, settings.key_year)?;
    key_numbers::merge(config.key_numbers_path(), &numbers)
}
