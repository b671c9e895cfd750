use super::*;

pub const UNSPECIFIED_GROUP_LABEL: &str = "(unspecified)";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("unknown group column '{0}'")]
    UnknownGroupColumn(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupBy {
    Manager,
    Coordinator,
    Column(String),
}

impl GroupBy {
    pub fn from_arg(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed.to_uppercase().as_str() {
            "MANAGER" | "GERENTE" | MANAGER_COLUMN => Self::Manager,
            "COORDINATOR" | "COORDENADOR" | COORDINATOR_COLUMN => Self::Coordinator,
            _ => Self::Column(trimmed.to_string()),
        }
    }

    pub fn column_name(&self) -> &str {
        match self {
            Self::Manager => MANAGER_COLUMN,
            Self::Coordinator => COORDINATOR_COLUMN,
            Self::Column(name) => name,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSource {
    Manager,
    Coordinator,
    Passthrough(usize),
}

impl GroupSource {
    fn resolve(table: &ResolvedTable, group_by: &GroupBy) -> Result<Self, AggregateError> {
        match group_by {
            GroupBy::Manager => Ok(Self::Manager),
            GroupBy::Coordinator => Ok(Self::Coordinator),
            GroupBy::Column(name) => {
                let wanted = name.trim().to_uppercase();
                table
                    .passthrough_headers
                    .iter()
                    .position(|header| header.trim().to_uppercase() == wanted)
                    .map(Self::Passthrough)
                    .ok_or_else(|| AggregateError::UnknownGroupColumn(name.clone()))
            }
        }
    }

    fn value<'a>(self, row: &'a ResolvedStatus) -> Option<&'a str> {
        let value = match self {
            Self::Manager => row.record.manager.as_deref(),
            Self::Coordinator => row.record.coordinator.as_deref(),
            Self::Passthrough(index) => row.record.passthrough.get(index).map(String::as_str),
        };
        value.map(str::trim).filter(|value| !value.is_empty())
    }
}

// Named groups sort before the unspecified bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum GroupLabel {
    Named(String),
    Unspecified,
}

impl GroupLabel {
    fn into_label(self) -> String {
        match self {
            Self::Named(label) => label,
            Self::Unspecified => UNSPECIFIED_GROUP_LABEL.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    total: usize,
    ok: usize,
}

pub fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = 100.0 * part as f64 / total as f64;
    (raw * 10.0).round() / 10.0
}

pub fn summarize(
    table: &ResolvedTable,
    group_by: &GroupBy,
    ok_status: &str,
) -> Result<Vec<GroupSummary>, AggregateError> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let source = GroupSource::resolve(table, group_by)?;

    let mut tallies = BTreeMap::<GroupLabel, Tally>::new();
    for row in &table.rows {
        let label = match source.value(row) {
            Some(value) => GroupLabel::Named(value.to_string()),
            None => GroupLabel::Unspecified,
        };
        let tally = tallies.entry(label).or_default();
        tally.total += 1;
        if row.is_ok(ok_status) {
            tally.ok += 1;
        }
    }

    let summaries = tallies
        .into_iter()
        .map(|(label, tally)| {
            let pending = tally.total - tally.ok;
            GroupSummary {
                label: label.into_label(),
                total: tally.total,
                ok: tally.ok,
                pending,
                percent_ok: percentage(tally.ok, tally.total),
                percent_pending: percentage(pending, tally.total),
            }
        })
        .collect::<Vec<GroupSummary>>();

    debug!(
        group_column = %group_by.column_name(),
        groups = summaries.len(),
        "summarized compliance by group"
    );

    Ok(summaries)
}

pub fn overview(table: &ResolvedTable, ok_status: &str) -> ComplianceOverview {
    let total = table.len();
    let ok = table.rows.iter().filter(|row| row.is_ok(ok_status)).count();
    let pending = total - ok;

    ComplianceOverview {
        total,
        ok,
        pending,
        overdue: table.rows.iter().filter(|row| row.overdue).count(),
        never_inspected: table
            .rows
            .iter()
            .filter(|row| row.elapsed == Elapsed::Never)
            .count(),
        percent_ok: percentage(ok, total),
        percent_pending: percentage(pending, total),
    }
}

/// Keeps the rows whose group value equals `value`, compared trimmed and
/// case-insensitively.
pub fn filter_group(
    table: &ResolvedTable,
    group_by: &GroupBy,
    value: &str,
) -> Result<ResolvedTable, AggregateError> {
    if table.is_empty() {
        return Ok(table.clone());
    }
    let source = GroupSource::resolve(table, group_by)?;
    let wanted = value.trim().to_lowercase();

    Ok(table.retain(|row| {
        source
            .value(row)
            .is_some_and(|candidate| candidate.to_lowercase() == wanted)
    }))
}
