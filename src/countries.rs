// src/countries.rs

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::{collections::BTreeMap, fs::File, io::Read, path::Path};
use tracing::debug;

/// Bundled `name,continent,pattern` table. Patterns are case-insensitive and
/// must match the whole (whitespace-normalised) country name.
static DEFAULT_TABLE: &str = include_str!("../data/country_continents.csv");

#[derive(Debug, Deserialize)]
struct Row {
    name: String,
    continent: String,
    pattern: String,
}

#[derive(Debug)]
struct Entry {
    name: String,
    continent: String,
    regex: Regex,
}

/// Country name → continent, driven by a hand-maintained regex table.
///
/// Exact overrides (e.g. `Global Stockpile`) are checked before the table;
/// within the table the first matching row wins.
#[derive(Debug)]
pub struct ContinentLookup {
    entries: Vec<Entry>,
    overrides: BTreeMap<String, String>,
}

impl ContinentLookup {
    pub fn builtin() -> Result<Self> {
        Self::from_reader(DEFAULT_TABLE.as_bytes()).context("loading bundled continent table")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("loading continent table {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut entries = Vec::new();
        for (idx, result) in rdr.deserialize::<Row>().enumerate() {
            let row = result.with_context(|| format!("continent table record {}", idx))?;
            let regex = RegexBuilder::new(&format!("^(?:{})$", row.pattern))
                .case_insensitive(true)
                .build()
                .with_context(|| format!("bad pattern for {}: {}", row.name, row.pattern))?;
            entries.push(Entry {
                name: row.name,
                continent: row.continent,
                regex,
            });
        }
        debug!(entries = entries.len(), "loaded continent table");
        Ok(Self {
            entries,
            overrides: BTreeMap::new(),
        })
    }

    /// Add exact-name mappings that bypass the regex table.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Self {
        for (name, continent) in overrides {
            self.overrides.insert(normalise(name), continent.clone());
        }
        self
    }

    pub fn continent(&self, country: &str) -> Option<&str> {
        let key = normalise(country);
        if let Some(continent) = self.overrides.get(&key) {
            return Some(continent);
        }
        self.find(&key).map(|e| e.continent.as_str())
    }

    /// Canonical short name of a country, if the table knows it.
    pub fn canonical_name(&self, country: &str) -> Option<&str> {
        self.find(&normalise(country)).map(|e| e.name.as_str())
    }

    fn find(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.regex.is_match(key))
    }
}

fn normalise(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_resolves_common_spellings() {
        let lookup = ContinentLookup::builtin().unwrap();
        assert_eq!(lookup.continent("Nigeria"), Some("Africa"));
        assert_eq!(lookup.continent("Niger"), Some("Africa"));
        assert_eq!(lookup.continent("Cote d'Ivoire"), Some("Africa"));
        assert_eq!(lookup.continent("Côte d’Ivoire"), Some("Africa"));
        assert_eq!(lookup.continent("Sao Tome & Principe"), Some("Africa"));
        assert_eq!(lookup.continent("  democratic republic of the  Congo "), Some("Africa"));
        assert_eq!(lookup.continent("Papua New Guinea"), Some("Oceania"));
        assert_eq!(lookup.continent("Dominican Republic"), Some("America"));
        assert_eq!(lookup.continent("Lao PDR"), Some("Asia"));
        assert_eq!(lookup.continent("United Kingdom"), Some("Europe"));
        assert_eq!(lookup.continent("Atlantis"), None);
    }

    #[test]
    fn canonical_names_distinguish_neighbours() {
        let lookup = ContinentLookup::builtin().unwrap();
        assert_eq!(lookup.canonical_name("guinea"), Some("Guinea"));
        assert_eq!(lookup.canonical_name("Guinea-Bissau"), Some("Guinea-Bissau"));
        assert_eq!(lookup.canonical_name("Equatorial Guinea"), Some("Equatorial Guinea"));
        assert_eq!(lookup.canonical_name("South Sudan"), Some("South Sudan"));
        assert_eq!(lookup.canonical_name("Sudan"), Some("Sudan"));
        assert_eq!(lookup.canonical_name("DRC"), Some("Democratic Republic of the Congo"));
        assert_eq!(lookup.canonical_name("Congo"), Some("Congo"));
    }

    #[test]
    fn overrides_win_over_table() {
        let overrides: BTreeMap<String, String> = [("Global Stockpile", "global_stockpile")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let lookup = ContinentLookup::builtin().unwrap().with_overrides(&overrides);
        assert_eq!(lookup.continent("Global  Stockpile"), Some("global_stockpile"));
        assert_eq!(lookup.continent("Kenya"), Some("Africa"));
    }

    #[test]
    fn custom_table_is_used() {
        let table = "name,continent,pattern\nNarnia,Fiction,narnia|the wardrobe\n";
        let lookup = ContinentLookup::from_reader(table.as_bytes()).unwrap();
        assert_eq!(lookup.continent("The Wardrobe"), Some("Fiction"));
        assert_eq!(lookup.continent("Kenya"), None);
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let table = "name,continent,pattern\nBroken,Nowhere,(unclosed\n";
        assert!(ContinentLookup::from_reader(table.as_bytes()).is_err());
    }
}
