use chrono::{DateTime, NaiveDateTime};
use regex::Regex;

use super::*;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const ROLE_ORDER: [ColumnRole; 6] = [
    ColumnRole::Technician,
    ColumnRole::Product,
    ColumnRole::InspectionDate,
    ColumnRole::Manager,
    ColumnRole::Coordinator,
    ColumnRole::Status,
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no column matches required role '{role}'")]
    MissingColumn { role: ColumnRole },
}

#[derive(Debug, Clone)]
struct HeaderMatcher {
    role: ColumnRole,
    exact: Vec<String>,
    contains: Vec<String>,
    patterns: Vec<Regex>,
}

impl HeaderMatcher {
    fn compile(role: ColumnRole, aliases: &RoleAliases) -> Result<Self, PolicyError> {
        if role.is_required() && aliases.is_empty() {
            return Err(PolicyError::EmptyMatcher { role });
        }

        let patterns = aliases
            .patterns
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<Result<Vec<Regex>, regex::Error>>()
            .map_err(|source| PolicyError::InvalidPattern { role, source })?;

        Ok(Self {
            role,
            exact: fold_all(&aliases.exact),
            contains: fold_all(&aliases.contains),
            patterns,
        })
    }

    fn matches(&self, header: &str) -> bool {
        let trimmed = header.trim();
        let folded = trimmed.to_uppercase();

        self.exact.iter().any(|alias| *alias == folded)
            || self.contains.iter().any(|marker| folded.contains(marker.as_str()))
            || self.patterns.iter().any(|pattern| pattern.is_match(trimmed))
    }
}

fn fold_all(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.trim().to_uppercase())
        .filter(|value| !value.is_empty())
        .collect()
}

#[derive(Debug, Default)]
struct ColumnLayout {
    technician: usize,
    product: usize,
    inspection_date: usize,
    manager: Option<usize>,
    coordinator: Option<usize>,
    status: Option<usize>,
    passthrough: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    matchers: Vec<HeaderMatcher>,
}

impl Normalizer {
    pub fn new(aliases: &ColumnAliases) -> Result<Self, PolicyError> {
        let matchers = ROLE_ORDER
            .iter()
            .map(|role| HeaderMatcher::compile(*role, aliases.for_role(*role)))
            .collect::<Result<Vec<HeaderMatcher>, PolicyError>>()?;

        Ok(Self { matchers })
    }

    pub fn normalize(&self, raw: &RawTable) -> Result<NormalizedTable, NormalizeError> {
        let layout = self.resolve_layout(&raw.headers)?;

        let passthrough_headers = layout
            .passthrough
            .iter()
            .map(|index| raw.headers[*index].trim().to_string())
            .collect::<Vec<String>>();

        let mut date_parse_failures = 0_usize;
        let mut records = Vec::with_capacity(raw.rows.len());
        for (source_row, row) in raw.rows.iter().enumerate() {
            let technician = cell(row, layout.technician).to_string();
            let product = cell(row, layout.product).to_string();

            let date_cell = cell(row, layout.inspection_date);
            let inspection_date = parse_inspection_date(date_cell);
            if inspection_date.is_none() && !date_cell.trim().is_empty() {
                date_parse_failures += 1;
                debug!(row = source_row, value = %date_cell, "unparseable inspection date");
            }

            records.push(InspectionRecord {
                source_row,
                key: IdentityKey::new(&technician, &product),
                technician,
                product,
                inspection_date,
                status: layout
                    .status
                    .and_then(|index| normalize_status(cell(row, index))),
                manager: layout.manager.and_then(|index| optional_cell(row, index)),
                coordinator: layout
                    .coordinator
                    .and_then(|index| optional_cell(row, index)),
                passthrough: layout
                    .passthrough
                    .iter()
                    .map(|index| cell(row, *index).to_string())
                    .collect(),
            });
        }

        Ok(NormalizedTable {
            passthrough_headers,
            records,
            date_parse_failures,
        })
    }

    fn resolve_layout(&self, headers: &[String]) -> Result<ColumnLayout, NormalizeError> {
        let mut claimed = vec![false; headers.len()];
        let mut layout = ColumnLayout::default();

        for matcher in &self.matchers {
            let candidates = headers
                .iter()
                .enumerate()
                .filter(|(index, header)| !claimed[*index] && matcher.matches(header))
                .map(|(index, _)| index)
                .collect::<Vec<usize>>();

            let Some(&chosen) = candidates.first() else {
                if matcher.role.is_required() {
                    return Err(NormalizeError::MissingColumn { role: matcher.role });
                }
                continue;
            };

            if candidates.len() > 1 {
                warn!(
                    role = %matcher.role,
                    chosen = %headers[chosen].trim(),
                    candidates = candidates.len(),
                    "several columns match role; using the first"
                );
            }
            claimed[chosen] = true;

            match matcher.role {
                ColumnRole::Technician => layout.technician = chosen,
                ColumnRole::Product => layout.product = chosen,
                ColumnRole::InspectionDate => layout.inspection_date = chosen,
                ColumnRole::Manager => layout.manager = Some(chosen),
                ColumnRole::Coordinator => layout.coordinator = Some(chosen),
                ColumnRole::Status => layout.status = Some(chosen),
            }
        }

        layout.passthrough = (0..headers.len()).filter(|index| !claimed[*index]).collect();
        Ok(layout)
    }
}

fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

fn optional_cell(row: &[String], index: usize) -> Option<String> {
    let value = cell(row, index).trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

pub fn parse_inspection_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(timestamp.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
                .map(|timestamp| timestamp.date())
        })
}
