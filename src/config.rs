// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    ops::Range,
    path::{Path, PathBuf},
};

/// Everything the pipelines need to know about where data lives and how the
/// raw sheets are laid out. Every field has a default, so a YAML file only
/// needs the parts it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: Paths,
    /// File name of the key-number document, relative to `paths.output`.
    pub key_numbers_file: String,
    pub demand: DemandConfig,
    pub gavi: GaviConfig,
    pub who_supply: WhoSupplyConfig,
    pub mi4a: Mi4aConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: Paths::default(),
            key_numbers_file: "key_numbers.json".into(),
            demand: DemandConfig::default(),
            gavi: GaviConfig::default(),
            who_supply: WhoSupplyConfig::default(),
            mi4a: Mi4aConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub raw_data: PathBuf,
    pub output: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            raw_data: PathBuf::from("raw_data"),
            output: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    pub input_file: String,
    /// Exact country names replaced before the continent lookup.
    pub country_renames: BTreeMap<String, String>,
    /// Rows whose country starts with the key are folded into the value
    /// (e.g. `India: Bihar` → `India`).
    pub collapse_prefixes: BTreeMap<String, String>,
    /// Country names mapped straight to a continent label.
    pub additional_mapping: BTreeMap<String, String>,
    /// Optional replacement for the bundled country → continent table.
    pub continent_table: Option<PathBuf>,
    pub last_year_measured: i32,
    pub key_year: i32,
    pub output_file: String,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            input_file: "demand_total_required_supply_by_country.csv".into(),
            country_renames: pairs(&[("CAR", "Central African Republic")]),
            collapse_prefixes: pairs(&[("India:", "India")]),
            additional_mapping: pairs(&[("Global Stockpile", "global_stockpile")]),
            continent_table: None,
            last_year_measured: 2024,
            key_year: 2030,
            output_file: "vaccine_demand_by_region_year.csv".into(),
        }
    }
}

/// Where the data sits inside one exported PDF table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSetting {
    pub first_row: usize,
    /// Seven column indices; the last one holds the dose quantity.
    pub keep_cols: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaviConfig {
    /// Glob, relative to `paths.raw_data`, matching one CSV per PDF table.
    pub tables_glob: String,
    /// Indexed by table position after sorting by page then table number.
    pub page_settings: Vec<PageSetting>,
    pub non_vaccines: Vec<String>,
    pub funding_filter: String,
    pub transitioning_countries: Vec<String>,
    pub output_file: String,
}

impl Default for GaviConfig {
    fn default() -> Self {
        // Tables 0 and 12 carry the quantity one column further right.
        let page_settings = (0..28)
            .map(|page| PageSetting {
                first_row: if page == 0 { 4 } else { 0 },
                keep_cols: if page == 0 || page == 12 {
                    vec![0, 1, 2, 3, 4, 6, 8]
                } else {
                    vec![0, 1, 2, 3, 4, 6, 7]
                },
            })
            .collect();

        Self {
            tables_glob: "Gavi-shipments-2023-page-*-table-*.csv".into(),
            page_settings,
            non_vaccines: strings(&[
                "AD-Syringe, 0.5 ml",
                "AD-Syringe, 0.1 ml",
                "RUP-2.0 ml",
                "RUP-5.0 ml",
                "Safety Box, 5 Litre",
            ]),
            funding_filter: "GAVI".into(),
            transitioning_countries: strings(&[
                "Sao Tome & Principe",
                "Nigeria",
                "Kenya",
                "Ghana",
                "Djibouti",
                "Cote d'Ivoire",
            ]),
            output_file: "gavi_vaccine_supply.csv".into(),
        }
    }
}

/// Half-open row/column ranges of one table inside the sheet, counted after
/// the sheet's header rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLocation {
    pub rows: Range<usize>,
    pub columns: Range<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhoSupplyConfig {
    pub input_file: String,
    pub header_rows: usize,
    pub table: String,
    pub tables: BTreeMap<String, TableLocation>,
    pub display_order: Vec<String>,
    /// Annual African production target, in millions of doses.
    pub production_target_millions: f64,
    pub output_file: String,
}

impl Default for WhoSupplyConfig {
    fn default() -> Self {
        let tables = [
            ("with_covid_who_region", 10..17),
            ("with_covid_continent", 18..25),
            ("without_covid_who_region", 29..36),
            ("without_covid_continent", 37..44),
        ]
        .into_iter()
        .map(|(name, rows)| {
            (
                name.to_string(),
                TableLocation {
                    rows,
                    columns: 2..6,
                },
            )
        })
        .collect();

        Self {
            input_file: "GVMR 2023 - ONE Campaign May 2024_vShared.csv".into(),
            header_rows: 1,
            table: "with_covid_continent".into(),
            tables,
            display_order: strings(&[
                "Africa",
                "Asia",
                "North America",
                "Europe",
                "South America",
                "Oceania",
            ]),
            production_target_millions: 1500.0,
            output_file: "african_vaccine_supply.csv".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Mi4aConfig {
    pub input_file: String,
    pub first_year: i32,
    pub last_year: i32,
    pub output_file: String,
}

impl Default for Mi4aConfig {
    fn default() -> Self {
        Self {
            input_file: "2023_mi4a_public_database.csv".into(),
            first_year: 2019,
            last_year: 2021,
            output_file: "vaccine_purchases_by_year.csv".into(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn pairs(items: &[(&str, &str)]) -> BTreeMap<String, String> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Config {
    /// Load from a YAML file, or fall back to the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_yaml(&text).with_context(|| format!("parsing config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn raw_file(&self, name: &str) -> PathBuf {
        self.paths.raw_data.join(name)
    }

    pub fn output_file(&self, name: &str) -> PathBuf {
        self.paths.output.join(name)
    }

    /// The single key-number document every pipeline merges into.
    pub fn key_numbers_path(&self) -> PathBuf {
        self.output_file(&self.key_numbers_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_source_layout() {
        let config = Config::load(None).unwrap();
        assert_eq!(
            config.key_numbers_path(),
            PathBuf::from("output").join("key_numbers.json")
        );
        assert_eq!(config.gavi.page_settings.len(), 28);
        assert_eq!(config.gavi.page_settings[0].first_row, 4);
        assert_eq!(config.gavi.page_settings[12].keep_cols.last(), Some(&8));
        assert_eq!(config.gavi.page_settings[5].keep_cols.last(), Some(&7));
        assert_eq!(
            config.who_supply.tables["with_covid_continent"],
            TableLocation {
                rows: 18..25,
                columns: 2..6
            }
        );
        assert_eq!(config.demand.additional_mapping["Global Stockpile"], "global_stockpile");
    }

    #[test]
    fn yaml_overrides_only_what_it_names() {
        let yaml = r#"
paths:
  output: build/out
key_numbers_file: numbers.json
who_supply:
  table: without_covid_continent
demand:
  last_year_measured: 2025
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.paths.output, PathBuf::from("build/out"));
        assert_eq!(config.paths.raw_data, PathBuf::from("raw_data"));
        assert_eq!(
            config.key_numbers_path(),
            PathBuf::from("build/out").join("numbers.json")
        );
        assert_eq!(config.who_supply.table, "without_covid_continent");
        assert_eq!(config.who_supply.tables.len(), 4);
        assert_eq!(config.demand.last_year_measured, 2025);
        assert_eq!(config.demand.key_year, 2030);
    }

    #[test]
    fn table_locations_parse_from_yaml() {
        let yaml = r#"
who_supply:
  table: custom
  tables:
    custom:
      rows: { start: 1, end: 4 }
      columns: { start: 0, end: 4 }
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.who_supply.tables.len(), 1);
        assert_eq!(config.who_supply.tables["custom"].rows, 1..4);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("reading config"));
    }
}
