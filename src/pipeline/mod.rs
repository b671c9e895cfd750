use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{
    ColumnRole, ComplianceOverview, Elapsed, GroupSummary, IdentityKey, InspectionRecord,
    NormalizedTable, RawTable, ResolvedStatus, ResolvedTable, RunStats, COORDINATOR_COLUMN,
    MANAGER_COLUMN,
};
use crate::policy::{ColumnAliases, CompliancePolicy, PolicyError, RoleAliases};

mod aggregate;
mod normalize;
mod resolve;
mod staleness;

pub use aggregate::{AggregateError, GroupBy, filter_group, overview, percentage, summarize};
pub use normalize::{NormalizeError, Normalizer, parse_inspection_date};
pub use resolve::resolve_latest;
pub use staleness::{classify, elapsed_since, normalize_status};

/// The full raw-table to resolved-table transform. Built once from a
/// validated policy; `run` is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    normalizer: Normalizer,
    overdue_after_days: i64,
    ok_status: String,
}

#[derive(Debug)]
pub struct PipelineRun {
    pub resolved: ResolvedTable,
    pub stats: RunStats,
    pub validation_issue: Option<NormalizeError>,
}

impl Pipeline {
    pub fn new(policy: &CompliancePolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        let normalizer = Normalizer::new(&policy.columns)?;
        let ok_status = normalize_status(&policy.ok_status).ok_or(PolicyError::BlankOkStatus)?;

        Ok(Self {
            normalizer,
            overdue_after_days: policy.overdue_after_days,
            ok_status,
        })
    }

    pub fn ok_status(&self) -> &str {
        &self.ok_status
    }

    pub fn overdue_after_days(&self) -> i64 {
        self.overdue_after_days
    }

    pub fn run(&self, raw: &RawTable, reference_date: NaiveDate) -> PipelineRun {
        let mut stats = RunStats {
            input_rows: raw.row_count(),
            ..RunStats::default()
        };

        let normalized = match self.normalizer.normalize(raw) {
            Ok(normalized) => normalized,
            Err(err) => {
                warn!(error = %err, "input table failed validation");
                return PipelineRun {
                    resolved: ResolvedTable::empty(),
                    stats,
                    validation_issue: Some(err),
                };
            }
        };

        stats.date_parse_failures = normalized.date_parse_failures;
        stats.dated_rows = normalized
            .records
            .iter()
            .filter(|record| record.inspection_date.is_some())
            .count();
        stats.undated_rows = normalized.records.len() - stats.dated_rows;
        stats.distinct_keys = normalized
            .records
            .iter()
            .map(|record| &record.key)
            .collect::<HashSet<&IdentityKey>>()
            .len();
        stats.future_dates_clamped = normalized
            .records
            .iter()
            .filter(|record| {
                record
                    .inspection_date
                    .is_some_and(|date| date > reference_date)
            })
            .count();

        let NormalizedTable {
            passthrough_headers,
            records,
            ..
        } = normalized;

        let latest = resolve_latest(records);
        let rows = classify(latest, reference_date, self.overdue_after_days);
        stats.resolved_rows = rows.len();

        info!(
            input_rows = stats.input_rows,
            resolved_rows = stats.resolved_rows,
            undated_rows = stats.undated_rows,
            date_parse_failures = stats.date_parse_failures,
            "resolved inspection records"
        );

        PipelineRun {
            resolved: ResolvedTable {
                passthrough_headers,
                rows,
            },
            stats,
            validation_issue: None,
        }
    }

    pub fn summarize(
        &self,
        table: &ResolvedTable,
        group_by: &GroupBy,
    ) -> Result<Vec<GroupSummary>, AggregateError> {
        summarize(table, group_by, &self.ok_status)
    }

    pub fn overview(&self, table: &ResolvedTable) -> ComplianceOverview {
        overview(table, &self.ok_status)
    }

    pub fn pending(&self, table: &ResolvedTable) -> ResolvedTable {
        table.retain(|row| !row.is_ok(&self.ok_status))
    }
}
