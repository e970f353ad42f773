//! Share of Gavi-funded vaccine doses shipped to the six countries due to
//! transition out of Gavi support, from the "Gavi Shipments 2023" PDF tables
//! (one CSV per extracted table).

use anyhow::{bail, Context, Result};
use glob::glob;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::config::{Config, GaviConfig, PageSetting};
use crate::key_numbers::{self, percent, KeyNumbers};
use crate::table::{self, clean_str, parse_number, RawGrid};

pub const KEY_NUMBER: &str = "share_of_gavi_vaccine_supply_for_six_transitioning_countries";

const COLUMN_COUNT: usize = 7;

static TABLE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"page-(\d+)-table-(\d+)").expect("table file pattern should parse"));

/// One shipment line, with the column names of the printed report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shipment {
    pub country: String,
    pub product: String,
    pub gavi_approval_year: String,
    pub gavi_business_key: String,
    pub gavi_non_gavi: String,
    pub delivery_date: String,
    pub total_quantity_in_doses: f64,
}

/// Find the per-table CSV exports and order them by page, then table number.
pub fn discover_tables(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!("{}/{}", dir.display(), pattern);
    let mut found: Vec<((u32, u32), PathBuf)> = Vec::new();
    for entry in glob(&full).with_context(|| format!("invalid glob pattern {}", full))? {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                warn!("cannot read glob entry: {}", e);
                continue;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(caps) = TABLE_FILE.captures(&name) else {
            warn!(file = %name, "not a page table export; skipping");
            continue;
        };
        let page: u32 = caps[1].parse()?;
        let table: u32 = caps[2].parse()?;
        found.push(((page, table), path));
    }
    found.sort();
    Ok(found.into_iter().map(|(_, p)| p).collect())
}

/// Stack the tables into shipment lines, keeping each table's configured rows
/// and columns. The last kept column is the dose quantity; blanks count as 0.
pub fn concatenate_tables(tables: &[RawGrid], settings: &[PageSetting]) -> Result<Vec<Shipment>> {
    if settings.len() > tables.len() {
        warn!(
            tables = tables.len(),
            settings = settings.len(),
            "fewer tables than page settings"
        );
    }

    let mut shipments = Vec::new();
    for (idx, grid) in tables.iter().enumerate() {
        let Some(setting) = settings.get(idx) else {
            warn!(table = idx, "no page setting for table; skipping");
            continue;
        };
        if setting.keep_cols.len() != COLUMN_COUNT {
            bail!(
                "page setting {} keeps {} columns, expected {}",
                idx,
                setting.keep_cols.len(),
                COLUMN_COUNT
            );
        }

        let selected = grid.select(setting.first_row, &setting.keep_cols);
        let before = shipments.len();
        for row in &selected.rows {
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            shipments.push(Shipment {
                country: clean_str(&row[0]),
                product: clean_str(&row[1]),
                gavi_approval_year: clean_str(&row[2]),
                gavi_business_key: clean_str(&row[3]),
                gavi_non_gavi: clean_str(&row[4]),
                delivery_date: clean_str(&row[5]),
                total_quantity_in_doses: parse_number(&row[6]).unwrap_or(0.0),
            });
        }
        debug!(table = idx, rows = shipments.len() - before, "stacked table");
    }
    Ok(shipments)
}

/// Sum of each transitioning country's share of all Gavi-funded vaccine doses.
pub fn transitioning_share(shipments: &[Shipment], settings: &GaviConfig) -> Result<f64> {
    let non_vaccines: HashSet<&str> = settings.non_vaccines.iter().map(String::as_str).collect();

    let mut by_country: BTreeMap<&str, f64> = BTreeMap::new();
    for s in shipments {
        if non_vaccines.contains(s.product.as_str()) || s.gavi_non_gavi != settings.funding_filter {
            continue;
        }
        *by_country.entry(s.country.as_str()).or_default() += s.total_quantity_in_doses;
    }

    let total: f64 = by_country.values().sum();
    if total <= 0.0 {
        bail!(
            "no {} funded vaccine doses among {} shipment lines",
            settings.funding_filter,
            shipments.len()
        );
    }

    let mut share = 0.0;
    for country in &settings.transitioning_countries {
        match by_country.get(country.as_str()) {
            Some(doses) => share += doses / total,
            None => warn!(country = %country, "transitioning country has no Gavi shipments"),
        }
    }
    Ok(share)
}

pub fn gavi_key_numbers(share: f64) -> KeyNumbers {
    let mut out = KeyNumbers::new();
    out.insert(KEY_NUMBER.to_string(), percent(share, 1));
    out
}

#[tracing::instrument(level = "info", skip(config))]
pub fn run(config: &Config) -> Result<()> {
    let settings = &config.gavi;
    let paths = discover_tables(&config.paths.raw_data, &settings.tables_glob)?;
    if paths.is_empty() {
        bail!(
            "no Gavi shipment tables matching {} in {}",
            settings.tables_glob,
            config.paths.raw_data.display()
        );
    }
    let tables = paths
        .iter()
        .map(RawGrid::from_path)
        .collect::<Result<Vec<_>>>()?;
    info!(tables = tables.len(), "loaded Gavi shipment tables");

    let shipments = concatenate_tables(&tables, &settings.page_settings)?;
    let output = config.output_file(&settings.output_file);
    table::write_records(&output, &shipments)?;
    info!(rows = shipments.len(), output = %output.display(), "wrote Gavi shipments");

    let share = transitioning_share(&shipments, settings)?;
    info!(share, "transitioning countries' share of Gavi supply");
    key_numbers::merge(config.key_numbers_path(), &gavi_key_numbers(share))
}
