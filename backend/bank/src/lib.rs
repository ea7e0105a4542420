//! # Food Bank
//!
//! Static catalogue of testable foods, embedded at compile time.
//!
//! - Categories in display order, each with its items
//! - Items carry their common adulterants and an expected test time
//! - Guides hold the step-by-step home test for an item, when one exists
//!
//! The catalogue is read-only. Edit `bank.json` and rebuild to change it.
use anyhow::{Context, Error, bail};

pub mod foods;

use foods::Bank;

const BANK_JSON: &str = include_str!("../bank.json");

pub fn get_bank() -> Result<Bank, Error> {
    let bank: Bank = serde_json::from_str(BANK_JSON).context("Failed to decode bank.json")?;

    for (category_id, items) in &bank.guides {
        for item_id in items.keys() {
            if bank.item(category_id, item_id).is_none() {
                bail!("Guide for unknown item {category_id}/{item_id}");
            }
        }
    }

    Ok(bank)
}
