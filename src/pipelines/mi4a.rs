//! Vaccine purchases by year from the WHO MI4A public database export.
//! Produces a chart table only; no key numbers come out of this pipeline.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, ops::RangeInclusive};
use tracing::{info, warn};

use crate::config::Config;
use crate::table::{self, parse_number};

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRecord {
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Country alias 2022", default)]
    pub country: String,
    #[serde(rename = "Vaccine", default)]
    pub vaccine: String,
    #[serde(rename = "Manufacturer", default)]
    pub manufacturer: String,
    #[serde(rename = "Dosage Number", default)]
    pub dosage_number: String,
    #[serde(rename = "Annual Number of Doses", default)]
    pub annual_doses: String,
}

impl PurchaseRecord {
    fn doses(&self) -> f64 {
        parse_number(&self.annual_doses).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTotal {
    pub year: i32,
    pub annual_doses: f64,
}

/// Aggregated total against the raw `annual doses × dosage number` total.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalCheck {
    pub final_overall_total: f64,
    pub overall_total: f64,
    pub check: bool,
}

pub fn aggregate_by_year(records: &[PurchaseRecord], years: RangeInclusive<i32>) -> Vec<YearTotal> {
    let mut by_year: BTreeMap<i32, f64> = BTreeMap::new();
    for r in records.iter().filter(|r| years.contains(&r.year)) {
        *by_year.entry(r.year).or_default() += r.doses();
    }
    by_year
        .into_iter()
        .map(|(year, annual_doses)| YearTotal { year, annual_doses })
        .collect()
}

pub fn total_check(
    aggregated: &[YearTotal],
    records: &[PurchaseRecord],
    years: RangeInclusive<i32>,
) -> TotalCheck {
    let final_overall_total: f64 = aggregated.iter().map(|t| t.annual_doses).sum();
    let overall_total: f64 = records
        .iter()
        .filter(|r| years.contains(&r.year))
        .map(|r| r.doses() * parse_number(&r.dosage_number).unwrap_or(0.0))
        .sum();
    TotalCheck {
        final_overall_total,
        overall_total,
        check: final_overall_total == overall_total,
    }
}

#[tracing::instrument(level = "info", skip(config))]
pub fn run(config: &Config) -> Result<()> {
    let settings = &config.mi4a;
    let input = config.raw_file(&settings.input_file);
    let records: Vec<PurchaseRecord> = table::read_records(&input)?;
    info!(rows = records.len(), input = %input.display(), "loaded MI4A purchases");

    let years = settings.first_year..=settings.last_year;
    let totals = aggregate_by_year(&records, years.clone());

    let check = total_check(&totals, &records, years);
    if check.check {
        info!(total = check.final_overall_total, "MI4A totals agree");
    } else {
        warn!(
            final_overall_total = check.final_overall_total,
            overall_total = check.overall_total,
            "MI4A aggregated doses differ from doses × dosage number"
        );
    }

    let output = config.output_file(&settings.output_file);
    table::write_records(&output, &totals)?;
    info!(rows = totals.len(), output = %output.display(), "wrote MI4A purchases by year");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
Region,Country alias 2022,Year,Vaccine,Manufacturer,Dosage Number,Annual Number of Doses
AFR,Kenya,2018,Measles,Serum Institute,1,5000
AFR,Kenya,2019,Measles,Serum Institute,1,\"1,000\"
AFR,Ghana,2019,Polio,Bio Farma,1,2000
EUR,Italy,2020,HPV,MSD,1,300
EUR,France,2021,Rota,GSK,1,
AMR,Chile,2022,Polio,Sanofi,1,7000
";

    fn records() -> Vec<PurchaseRecord> {
        table::read_records_from(SAMPLE.as_bytes()).unwrap()
    }

    #[test]
    fn doses_sum_by_year_within_range() {
        let totals = aggregate_by_year(&records(), 2019..=2021);
        assert_eq!(
            totals,
            vec![
                YearTotal { year: 2019, annual_doses: 3000.0 },
                YearTotal { year: 2020, annual_doses: 300.0 },
                YearTotal { year: 2021, annual_doses: 0.0 },
            ]
        );
    }

    #[test]
    fn check_flags_multi_dose_rows() {
        let mut recs = records();
        let totals = aggregate_by_year(&recs, 2019..=2021);
        let check = total_check(&totals, &recs, 2019..=2021);
        assert!(check.check);
        assert_eq!(check.overall_total, 3300.0);

        recs[2].dosage_number = "2".into();
        let check = total_check(&totals, &recs, 2019..=2021);
        assert!(!check.check);
        assert_eq!(check.final_overall_total, 3300.0);
        assert_eq!(check.overall_total, 5300.0);
    }

    #[test]
    fn run_writes_yearly_totals_without_touching_key_numbers() {
        let tmp = tempdir().unwrap();
        let mut config = Config::default();
        config.paths.raw_data = tmp.path().join("raw");
        config.paths.output = tmp.path().join("out");
        fs::create_dir_all(&config.paths.raw_data).unwrap();
        fs::write(config.raw_file(&config.mi4a.input_file), SAMPLE).unwrap();

        run(&config).unwrap();

        let out = fs::read_to_string(config.output_file(&config.mi4a.output_file)).unwrap();
        assert_eq!(out, "year,annual_doses\n2019,3000.0\n2020,300.0\n2021,0.0\n");
        assert!(!config.key_numbers_path().exists());
    }
}
