//! Two-line element (TLE) file handling.
//!
//! Each entry occupies either three lines (a name line followed by the two
//! data lines) or two lines (data lines only). Data lines carry fixed
//! prefixes `1 ` and `2 `, and the 5-digit catalog number sits at a fixed
//! character offset of the first data line.

use std::fs;
use std::path::Path;

use crate::error::{StkError, StkResult};

/// Character span of the catalog number on the first data line.
const CATALOG_SPAN: std::ops::Range<usize> = 2..7;

/// One satellite entry parsed from a TLE file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TleEntry {
    /// Sanitized object name, safe to embed in a Connect command.
    pub name: String,
    /// 5-digit catalog number from the first data line.
    pub catalog_number: String,
    /// Whether the entry carried its own name line in the source file.
    pub named_in_source: bool,
}

/// All entries parsed from one TLE file.
#[derive(Debug, Clone)]
pub struct TleSet {
    pub entries: Vec<TleEntry>,
}

impl TleSet {
    /// Parse a TLE file from disk.
    pub fn load(path: &Path) -> StkResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse TLE text. Entries with a missing or mismatched data line pair
    /// make the whole set malformed.
    pub fn parse(content: &str) -> StkResult<Self> {
        let mut entries = Vec::new();
        let mut lines = content.lines().filter(|line| !line.trim().is_empty());

        while let Some(first) = lines.next() {
            let (title, line1) = if first.starts_with("1 ") {
                (None, first)
            } else {
                let data = lines.next().ok_or_else(|| {
                    StkError::TleFormat(format!("name line {first:?} has no data lines"))
                })?;
                (Some(first), data)
            };
            let line2 = lines
                .next()
                .ok_or_else(|| StkError::TleFormat("entry is missing its second data line".into()))?;

            if !line1.starts_with("1 ") || !line2.starts_with("2 ") {
                return Err(StkError::TleFormat(format!(
                    "expected data line pair, got {line1:?} / {line2:?}"
                )));
            }

            let catalog_number = catalog_number_of(line1)?;
            let (name, named_in_source) = match title {
                Some(title) => (sanitize_name(title), true),
                None => (default_name(&catalog_number), false),
            };

            entries.push(TleEntry {
                name,
                catalog_number,
                named_in_source,
            });
        }

        Ok(Self { entries })
    }
}

/// Re-scan a TLE file for the entry matching a sanitized object name and
/// return its catalog number. `None` when no entry matches.
pub fn find_catalog_number(path: &Path, name: &str) -> StkResult<Option<String>> {
    let set = TleSet::load(path)?;
    Ok(set
        .entries
        .into_iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.catalog_number))
}

/// Reduce a raw TLE name line to characters Connect object names accept.
pub fn sanitize_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn default_name(catalog_number: &str) -> String {
    format!("SAT{catalog_number}")
}

fn catalog_number_of(line1: &str) -> StkResult<String> {
    let number = line1
        .get(CATALOG_SPAN)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| StkError::TleFormat(format!("no catalog number in {line1:?}")))?;
    Ok(number.to_string())
}
