//! Static reference data: the weather table and the fun-fact list.
//!
//! The canonical document ships inside the binary; `--seed` swaps in an
//! operator-provided file with the same schema.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::store::{Store, StoreError};

const EMBEDDED: &str = include_str!("../data/seed.json");

#[derive(Debug, Deserialize)]
pub struct SeedData {
    weather: BTreeMap<String, String>,
    facts: Vec<String>,
}

impl SeedData {
    /// The data compiled into the binary.
    pub fn embedded() -> Result<Self> {
        serde_json::from_str(EMBEDDED).context("embedded seed data is malformed")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("seed file {} is not valid JSON", path.display()))
    }

    /// Loads everything into the store. Safe to repeat: weather entries
    /// overwrite and the fact set ignores duplicates.
    pub fn apply(&self, store: &Store) -> Result<(), StoreError> {
        for (city, description) in &self.weather {
            store.put_weather(city, description)?;
        }
        for fact in &self.facts {
            store.add_fact(fact)?;
        }
        Ok(())
    }

    pub fn facts(&self) -> &[String] {
        &self.facts
    }
}
