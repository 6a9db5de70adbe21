//! Decides which funds a run covers.
//!
//! The universe comes from one of three places, in priority order: an
//! explicit comma-separated ISIN list, a file of ISINs (one per line), or
//! the provider's full search index. Favorites are merged in afterwards so
//! they are always part of the comparison.

use crate::config::AppConfig;
use crate::provider::FundDataSource;
use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// ISIN checksum validation per ISO 6166: two country letters, nine
/// alphanumerics, and a Luhn check digit over the letter-expanded string.
pub fn is_valid_isin(isin: &str) -> bool {
    if isin.len() != 12 || !isin.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    if !isin[..2].chars().all(|c| c.is_ascii_uppercase()) {
        return false;
    }

    let mut digits = Vec::with_capacity(24);
    for c in isin.chars() {
        if let Some(d) = c.to_digit(10) {
            digits.push(d);
        } else {
            let v = c.to_ascii_uppercase() as u32 - 'A' as u32 + 10;
            digits.push(v / 10);
            digits.push(v % 10);
        }
    }

    let mut sum = 0;
    for (i, d) in digits.iter().rev().enumerate() {
        let mut d = *d;
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

/// One ISIN per line; blank lines and `#` comments are skipped.
pub fn read_isin_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ISIN file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Reads the favorites CSV. The file is optional; when present it must have
/// an `isin` column (matched case-insensitively). Favorites are taken as-is,
/// without checksum validation.
pub fn load_favorites(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        debug!("No favorites file at {}", path.display());
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to read favorites file {}", path.display()))?;
    let headers = reader.headers().context("Favorites file has no header")?;
    let isin_column = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("isin"))
        .with_context(|| format!("No `isin` column in {}", path.display()))?;

    let mut favorites = Vec::new();
    for row in reader.records() {
        let row = row.context("Malformed favorites row")?;
        if let Some(isin) = row.get(isin_column) {
            let isin = isin.trim();
            if !isin.is_empty() {
                favorites.push(isin.to_string());
            }
        }
    }
    Ok(favorites)
}

fn merge_deduped(isins: Vec<String>, favorites: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(isins.len() + favorites.len());
    for isin in isins.into_iter().chain(favorites.iter().cloned()) {
        if seen.insert(isin.clone()) {
            merged.push(isin);
        }
    }
    merged
}

/// Resolves the full fund universe and the favorites subset.
///
/// Returns the ordered list of ISINs to fetch and the set of those that are
/// favorites.
pub async fn resolve(
    config: &AppConfig,
    source: &dyn FundDataSource,
) -> Result<(Vec<String>, HashSet<String>)> {
    let favorites = load_favorites(&config.favorites)?;

    let isins = match &config.isin {
        Some(argument) => {
            let parts: Vec<String> = argument
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !parts.is_empty() && parts.iter().all(|isin| is_valid_isin(isin)) {
                parts
            } else if Path::new(argument).is_file() {
                let listed = read_isin_file(Path::new(argument))?;
                if let Some(bad) = listed.iter().find(|isin| !is_valid_isin(isin)) {
                    bail!("`{bad}` in {argument} is not a valid ISIN");
                }
                listed
            } else {
                bail!("`{argument}` is neither a list of valid ISINs nor a readable file");
            }
        }
        None => {
            warn!("No ISIN selection given, comparing every fund the provider lists");
            source
                .search_isins()
                .await
                .context("Failed to list the provider's funds")?
        }
    };

    let merged = merge_deduped(isins, &favorites);
    Ok((merged, favorites.into_iter().collect()))
}
