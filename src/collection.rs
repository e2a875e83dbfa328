// SPDX-License-Identifier: GPL-3.0-only

//! Scanned card log
//!
//! Consumes recognition results and keeps one [`ScannedCardRecord`] per
//! distinct card, counting repeats. The log can be saved as JSON so a scan
//! run can be picked up later.

use crate::backends::recognition::RecognitionMatch;
use crate::errors::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Price pair shown for a record (decimal strings, USD)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPrices {
    pub normal: Option<String>,
    pub foil: Option<String>,
}

/// One distinct card in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannedCardRecord {
    pub id: String,
    pub name: String,
    pub finishes: Vec<String>,
    pub set: String,
    pub set_name: String,
    pub prices: RecordPrices,
    pub image_uri: Option<String>,
    /// Marked as the foil printing by the user
    pub foil: bool,
    pub quantity: u32,
    /// A foil printing exists and has a price
    pub has_foil: bool,
    /// Collector number without leading zeros
    pub collector_number: String,
    pub scanned_at: DateTime<Utc>,
}

impl ScannedCardRecord {
    pub fn from_match(card: &RecognitionMatch, scanned_at: DateTime<Utc>) -> Self {
        let has_foil =
            card.finishes.iter().any(|f| f == "foil") && card.prices.usd_foil.is_some();
        Self {
            id: card.card_id.clone(),
            name: card.name.clone(),
            finishes: card.finishes.clone(),
            set: card.set.clone(),
            set_name: card.set_name.clone(),
            prices: RecordPrices {
                normal: card.prices.usd.clone(),
                foil: card.prices.usd_foil.clone(),
            },
            image_uri: card.image_uris.normal.clone(),
            foil: false,
            quantity: 1,
            has_foil,
            collector_number: card.collector_number.trim_start_matches('0').to_string(),
            scanned_at,
        }
    }

    /// Unit price for the selected finish
    pub fn price(&self) -> Option<f64> {
        let price = if self.foil {
            self.prices.foil.as_deref()
        } else {
            self.prices.normal.as_deref()
        };
        price.and_then(|p| p.trim().parse().ok())
    }
}

/// Ordered log of scanned cards, first scan first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanLog {
    records: Vec<ScannedCardRecord>,
}

impl ScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ScannedCardRecord] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&ScannedCardRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of physical cards
    pub fn card_count(&self) -> u32 {
        self.records.iter().map(|r| r.quantity).sum()
    }

    /// Add a recognized card, merging repeats into the existing record
    pub fn apply(&mut self, card: &RecognitionMatch, now: DateTime<Utc>) -> &ScannedCardRecord {
        let index = match self.records.iter().position(|r| r.id == card.card_id) {
            Some(index) => {
                self.records[index].quantity += 1;
                debug!(
                    card_id = %card.card_id,
                    quantity = self.records[index].quantity,
                    "Repeat scan merged"
                );
                index
            }
            None => {
                self.records.push(ScannedCardRecord::from_match(card, now));
                self.records.len() - 1
            }
        };
        &self.records[index]
    }

    /// Flip the foil marker; returns the new value
    pub fn toggle_foil(&mut self, id: &str) -> Option<bool> {
        let record = self.records.iter_mut().find(|r| r.id == id)?;
        record.foil = !record.foil;
        Some(record.foil)
    }

    /// Remove one copy, dropping the record when none are left
    ///
    /// Returns the remaining quantity.
    pub fn remove_one(&mut self, id: &str) -> Option<u32> {
        let index = self.records.iter().position(|r| r.id == id)?;
        let record = &mut self.records[index];
        record.quantity = record.quantity.saturating_sub(1);
        let remaining = record.quantity;
        if remaining == 0 {
            self.records.remove(index);
        }
        Some(remaining)
    }

    /// Drop a record regardless of quantity
    pub fn remove(&mut self, id: &str) -> Option<ScannedCardRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    /// Sum of known prices times quantity; unpriced cards count as zero
    pub fn total_value(&self) -> f64 {
        self.records
            .iter()
            .filter_map(|r| r.price().map(|p| p * r.quantity as f64))
            .sum()
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let log: ScanLog = serde_json::from_str(&text)?;
        info!(path = %path.display(), records = log.len(), "Loaded scan log");
        Ok(log)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), records = self.len(), "Saved scan log");
        Ok(())
    }
}
