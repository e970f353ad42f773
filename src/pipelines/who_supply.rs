//! Vaccine supply by manufacturer headquarters, from the WHO Global Vaccine
//! Market Report sheet (exported to CSV).

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, WhoSupplyConfig};
use crate::key_numbers::{self, grouped, millions, percent, KeyNumbers};
use crate::table::{self, clean_str, parse_number, RawGrid};

pub const TOTAL_ROW: &str = "TOTAL";
pub const AFRICA: &str = "Africa";

/// One row of a WHO table, before shares are added.
#[derive(Debug, Clone, PartialEq)]
pub struct SupplyRow {
    pub manufacturer_hq: String,
    pub vaccines_to_world: f64,
    pub vaccines_to_africa: f64,
    pub share_of_production_to_africa: Option<f64>,
}

/// A row of the stacked bar chart: Africa and everyone else in separate
/// columns so they can be coloured differently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplyChartRow {
    pub manufacturer_hq: String,
    pub vaccines_to_world: f64,
    pub vaccines_to_africa: f64,
    pub share_of_production_to_africa: Option<f64>,
    pub share_of_global_vaccine_supply: f64,
    pub africa: f64,
    pub non_africa: f64,
}

/// Cut the named table out of the sheet (after its header rows).
pub fn get_data_table(sheet: &RawGrid, settings: &WhoSupplyConfig, table_name: &str) -> Result<RawGrid> {
    let Some(loc) = settings.tables.get(table_name) else {
        let known: Vec<&str> = settings.tables.keys().map(String::as_str).collect();
        bail!(
            "table name '{}' not found in table locations (known: {})",
            table_name,
            known.join(", ")
        );
    };
    sheet
        .clone()
        .skip_rows(settings.header_rows)
        .slice(loc.rows.clone(), loc.columns.clone())
        .with_context(|| format!("slicing table '{}'", table_name))
}

/// Name the four columns and parse the two dose counts.
pub fn parse_rows(table: &RawGrid) -> Result<Vec<SupplyRow>> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| -> Result<SupplyRow> {
            let cell = |c: usize| row.get(c).map(String::as_str).unwrap_or("");
            let manufacturer_hq = clean_str(cell(0));
            let number = |c: usize, what: &str| {
                parse_number(cell(c)).with_context(|| {
                    format!(
                        "row {} ({}): {} is not a number: {:?}",
                        idx,
                        manufacturer_hq,
                        what,
                        cell(c)
                    )
                })
            };
            Ok(SupplyRow {
                vaccines_to_world: number(1, "vaccines_to_world")?,
                vaccines_to_africa: number(2, "vaccines_to_africa")?,
                share_of_production_to_africa: parse_number(cell(3)),
                manufacturer_hq,
            })
        })
        .collect()
}

/// Add each region's share of the `TOTAL` row (in %), drop `TOTAL`, put the
/// rows in display order and split out the Africa column.
pub fn build_chart(rows: &[SupplyRow], display_order: &[String]) -> Result<Vec<SupplyChartRow>> {
    let total = rows
        .iter()
        .find(|r| r.manufacturer_hq == TOTAL_ROW)
        .map(|r| r.vaccines_to_world)
        .context("table has no TOTAL row")?;
    if total <= 0.0 {
        bail!("TOTAL vaccines_to_world is {}", total);
    }

    for r in rows {
        if r.manufacturer_hq != TOTAL_ROW && !display_order.contains(&r.manufacturer_hq) {
            debug!(row = %r.manufacturer_hq, "row not in display order; dropped");
        }
    }

    let mut chart = Vec::with_capacity(display_order.len());
    for name in display_order {
        let Some(r) = rows.iter().find(|r| &r.manufacturer_hq == name) else {
            warn!(row = %name, "display row missing from table");
            continue;
        };
        let share = r.vaccines_to_world * 100.0 / total;
        let is_africa = r.manufacturer_hq == AFRICA;
        chart.push(SupplyChartRow {
            manufacturer_hq: r.manufacturer_hq.clone(),
            vaccines_to_world: r.vaccines_to_world,
            vaccines_to_africa: r.vaccines_to_africa,
            share_of_production_to_africa: r.share_of_production_to_africa,
            share_of_global_vaccine_supply: share,
            africa: if is_africa { share } else { 0.0 },
            non_africa: if is_africa { 0.0 } else { share },
        });
    }
    Ok(chart)
}

fn to_world(chart: &[SupplyChartRow], hq: &str) -> f64 {
    chart
        .iter()
        .filter(|r| r.manufacturer_hq == hq)
        .map(|r| r.vaccines_to_world)
        .sum()
}

pub fn supply_key_numbers(chart: &[SupplyChartRow], target_millions: f64) -> Result<KeyNumbers> {
    let world_total: f64 = chart.iter().map(|r| r.vaccines_to_world).sum();
    let africa_total: f64 = chart.iter().map(|r| r.vaccines_to_africa).sum();
    if world_total <= 0.0 || africa_total <= 0.0 {
        bail!(
            "cannot compute supply shares: world total {}, Africa total {}",
            world_total,
            africa_total
        );
    }

    let afr_to_world = to_world(chart, AFRICA);
    if afr_to_world <= 0.0 {
        bail!("no vaccines produced by African manufacturers; fold increase is undefined");
    }
    let imported: f64 = chart
        .iter()
        .filter(|r| r.manufacturer_hq != AFRICA)
        .map(|r| r.vaccines_to_africa)
        .sum::<f64>()
        / africa_total;

    let entries = [
        ("africa_vaccine_production_value", millions(afr_to_world, 1)),
        (
            "africa_vaccine_production_share",
            percent(afr_to_world / world_total, 2),
        ),
        (
            "asia_vaccine_production_share",
            percent(to_world(chart, "Asia") / world_total, 1),
        ),
        (
            "na_vaccine_production_share",
            percent(to_world(chart, "North America") / world_total, 1),
        ),
        (
            "eur_vaccine_production_share",
            percent(to_world(chart, "Europe") / world_total, 1),
        ),
        (
            "fold_increase_required_to_target",
            grouped(target_millions / (afr_to_world / 1e6), 0),
        ),
        (
            "share_of_global_vaccines_delivered_to_africa",
            percent(africa_total / world_total, 1),
        ),
        ("share_of_vaccines_to_africa_imported", percent(imported, 1)),
        (
            "share_of_vaccines_to_africa_produced_by_africa",
            percent(1.0 - imported, 1),
        ),
    ];
    Ok(entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect())
}

#[tracing::instrument(level = "info", skip(config))]
pub fn run(config: &Config) -> Result<()> {
    let settings = &config.who_supply;
    let input = config.raw_file(&settings.input_file);
    let sheet = RawGrid::from_path(&input)?;

    let block = get_data_table(&sheet, settings, &settings.table)?;
    let rows = parse_rows(&block)?;
    let chart = build_chart(&rows, &settings.display_order)?;
    info!(table = %settings.table, rows = chart.len(), "built supply chart");

    let numbers = supply_key_numbers(&chart, settings.production_target_millions)?;
    key_numbers::merge(config.key_numbers_path(), &numbers)?;

    let output = config.output_file(&settings.output_file);
    table::write_records(&output, &chart)?;
    info!(output = %output.display(), "wrote supply chart");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableLocation;
    use std::fs;
    use tempfile::tempdir;

    // Header row, two filler rows, then the table in columns 1..5.
    const SHEET: &str = "\
Sheet,,,,,
note,,,,,
,,,,,
,Asia,\"4,000,000,000\",\"400,000,000\",0.1,
,Africa,\"10,000,000\",\"5,000,000\",0.5,
,Europe,\"3,000,000,000\",\"450,000,000\",0.15,
,North America,\"1,990,000,000\",\"100,000,000\",0.05,
,TOTAL,\"9,000,000,000\",\"955,000,000\",,
";

    fn settings() -> WhoSupplyConfig {
        let mut settings = WhoSupplyConfig::default();
        settings.tables.insert(
            "test".into(),
            TableLocation {
                rows: 2..7,
                columns: 1..5,
            },
        );
        settings.table = "test".into();
        settings
    }

    fn chart() -> Vec<SupplyChartRow> {
        let sheet = RawGrid::from_reader(SHEET.as_bytes()).unwrap();
        let table = get_data_table(&sheet, &settings(), "test").unwrap();
        let rows = parse_rows(&table).unwrap();
        build_chart(&rows, &settings().display_order).unwrap()
    }

    #[test]
    fn unknown_table_lists_known_names() {
        let sheet = RawGrid::from_reader(SHEET.as_bytes()).unwrap();
        let err = get_data_table(&sheet, &settings(), "nope").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'nope'"));
        assert!(msg.contains("with_covid_continent"));
    }

    #[test]
    fn chart_is_reordered_with_africa_split_out() {
        let chart = chart();
        let names: Vec<&str> = chart.iter().map(|r| r.manufacturer_hq.as_str()).collect();
        assert_eq!(names, vec!["Africa", "Asia", "North America", "Europe"]);

        let africa = &chart[0];
        assert!((africa.share_of_global_vaccine_supply - 10.0 / 9.0 * 0.1).abs() < 1e-9);
        assert_eq!(africa.africa, africa.share_of_global_vaccine_supply);
        assert_eq!(africa.non_africa, 0.0);

        let asia = &chart[1];
        assert!((asia.share_of_global_vaccine_supply - 400.0 / 9.0).abs() < 1e-9);
        assert_eq!(asia.africa, 0.0);
        assert_eq!(asia.non_africa, asia.share_of_global_vaccine_supply);
    }

    #[test]
    fn key_numbers_follow_report_formats() {
        let numbers = supply_key_numbers(&chart(), 1500.0).unwrap();

        assert_eq!(numbers["africa_vaccine_production_value"], "10.0 million");
        assert_eq!(numbers["africa_vaccine_production_share"], "0.11%");
        assert_eq!(numbers["asia_vaccine_production_share"], "44.4%");
        assert_eq!(numbers["na_vaccine_production_share"], "22.1%");
        assert_eq!(numbers["eur_vaccine_production_share"], "33.3%");
        assert_eq!(numbers["fold_increase_required_to_target"], "150");
        assert_eq!(numbers["share_of_global_vaccines_delivered_to_africa"], "10.6%");
        assert_eq!(numbers["share_of_vaccines_to_africa_imported"], "99.5%");
        assert_eq!(numbers["share_of_vaccines_to_africa_produced_by_africa"], "0.5%");
        assert_eq!(numbers.len(), 9);
    }

    #[test]
    fn missing_total_is_an_error() {
        let rows = vec![SupplyRow {
            manufacturer_hq: "Africa".into(),
            vaccines_to_world: 1.0,
            vaccines_to_africa: 1.0,
            share_of_production_to_africa: None,
        }];
        assert!(build_chart(&rows, &settings().display_order).is_err());
    }

    #[test]
    fn non_numeric_cell_names_the_row() {
        let table = RawGrid::from_rows(vec![vec![
            "Asia".into(),
            "lots".into(),
            "1".into(),
            "".into(),
        ]]);
        let err = parse_rows(&table).unwrap_err();
        assert!(err.to_string().contains("Asia"));
    }

    #[test]
    fn run_writes_chart_and_nine_indicators() {
        let tmp = tempdir().unwrap();
        let mut config = Config::default();
        config.paths.raw_data = tmp.path().join("raw");
        config.paths.output = tmp.path().join("out");
        config.who_supply = settings();
        fs::create_dir_all(&config.paths.raw_data).unwrap();
        fs::write(config.raw_file(&config.who_supply.input_file), SHEET).unwrap();

        run(&config).unwrap();

        let csv = fs::read_to_string(config.output_file(&config.who_supply.output_file)).unwrap();
        assert!(csv.starts_with("manufacturer_hq,vaccines_to_world,vaccines_to_africa,"));
        assert_eq!(csv.lines().count(), 5);
        let doc = key_numbers::KeyNumberStore::new(config.key_numbers_path())
            .load()
            .unwrap();
        assert_eq!(doc.len(), 9);
    }
}
