use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const TECHNICIAN_COLUMN: &str = "TECNICO";
pub const PRODUCT_COLUMN: &str = "PRODUTO";
pub const MANAGER_COLUMN: &str = "GERENTE_IMEDIATO";
pub const COORDINATOR_COLUMN: &str = "COORDENADOR_IMEDIATO";
pub const STATUS_COLUMN: &str = "STATUS CHECK LIST";
pub const INSPECTION_DATE_COLUMN: &str = "Data_Inspecao";
pub const ELAPSED_DAYS_COLUMN: &str = "Dias_Sem_Inspecao";
pub const OVERDUE_COLUMN: &str = "Vencido";

pub const NEVER_INSPECTED_SENTINEL: i64 = -1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ColumnRole {
    Technician,
    Product,
    InspectionDate,
    Manager,
    Coordinator,
    Status,
}

impl ColumnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Technician => "technician",
            Self::Product => "product",
            Self::InspectionDate => "inspection-date",
            Self::Manager => "manager",
            Self::Coordinator => "coordinator",
            Self::Status => "status",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(
            self,
            Self::Technician | Self::Product | Self::InspectionDate
        )
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a (technician, equipment item) pair. Both fields are trimmed
/// and lower-cased; the pair is compared field by field, never joined.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IdentityKey {
    pub technician: String,
    pub product: String,
}

impl IdentityKey {
    pub fn new(technician: &str, product: &str) -> Self {
        Self {
            technician: normalize_key_field(technician),
            product: normalize_key_field(product),
        }
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.technician, self.product)
    }
}

fn normalize_key_field(value: &str) -> String {
    value.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionRecord {
    pub source_row: usize,
    pub key: IdentityKey,
    pub technician: String,
    pub product: String,
    pub inspection_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub manager: Option<String>,
    pub coordinator: Option<String>,
    pub passthrough: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedTable {
    pub passthrough_headers: Vec<String>,
    pub records: Vec<InspectionRecord>,
    pub date_parse_failures: usize,
}

/// Days since the last inspection. `Never` is rendered as
/// [`NEVER_INSPECTED_SENTINEL`] at the table boundary and nowhere else.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Elapsed {
    Never,
    Days(i64),
}

impl Elapsed {
    pub fn as_sentinel(self) -> i64 {
        match self {
            Self::Never => NEVER_INSPECTED_SENTINEL,
            Self::Days(days) => days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStatus {
    pub record: InspectionRecord,
    pub elapsed: Elapsed,
    pub overdue: bool,
}

impl ResolvedStatus {
    pub fn key(&self) -> &IdentityKey {
        &self.record.key
    }

    pub fn is_ok(&self, ok_status: &str) -> bool {
        self.record.status.as_deref() == Some(ok_status)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTable {
    pub passthrough_headers: Vec<String>,
    pub rows: Vec<ResolvedStatus>,
}

impl ResolvedTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn retain<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&ResolvedStatus) -> bool,
    {
        Self {
            passthrough_headers: self.passthrough_headers.clone(),
            rows: self.rows.iter().filter(|row| keep(*row)).cloned().collect(),
        }
    }

    pub fn headers(&self) -> Vec<String> {
        let mut headers = Vec::with_capacity(self.passthrough_headers.len() + 8);
        headers.push(TECHNICIAN_COLUMN.to_string());
        headers.push(PRODUCT_COLUMN.to_string());
        headers.extend(self.passthrough_headers.iter().cloned());
        headers.push(MANAGER_COLUMN.to_string());
        headers.push(COORDINATOR_COLUMN.to_string());
        headers.push(STATUS_COLUMN.to_string());
        headers.push(INSPECTION_DATE_COLUMN.to_string());
        headers.push(ELAPSED_DAYS_COLUMN.to_string());
        headers.push(OVERDUE_COLUMN.to_string());
        headers
    }

    pub fn to_raw_table(&self) -> RawTable {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let record = &row.record;
                let mut cells = Vec::with_capacity(record.passthrough.len() + 8);
                cells.push(record.technician.clone());
                cells.push(record.product.clone());
                cells.extend(record.passthrough.iter().cloned());
                cells.push(record.manager.clone().unwrap_or_default());
                cells.push(record.coordinator.clone().unwrap_or_default());
                cells.push(record.status.clone().unwrap_or_default());
                cells.push(
                    record
                        .inspection_date
                        .map(|date| date.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                );
                cells.push(row.elapsed.as_sentinel().to_string());
                cells.push(row.overdue.to_string());
                cells
            })
            .collect();

        RawTable::new(self.headers(), rows)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub input_rows: usize,
    pub dated_rows: usize,
    pub undated_rows: usize,
    pub date_parse_failures: usize,
    pub distinct_keys: usize,
    pub resolved_rows: usize,
    pub future_dates_clamped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub label: String,
    pub total: usize,
    pub ok: usize,
    pub pending: usize,
    pub percent_ok: f64,
    pub percent_pending: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupReport {
    pub group_column: String,
    pub groups: Vec<GroupSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceOverview {
    pub total: usize,
    pub ok: usize,
    pub pending: usize,
    pub overdue: usize,
    pub never_inspected: usize,
    pub percent_ok: f64,
    pub percent_pending: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPolicy {
    pub overdue_after_days: i64,
    pub ok_status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportFilters {
    pub manager: Option<String>,
    pub coordinator: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportPaths {
    pub source_path: String,
    pub resolved_csv_path: String,
    pub pending_csv_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub reference_date: String,
    pub source_fingerprint: String,
    pub cache_hit: bool,
    pub policy: ReportPolicy,
    pub filters: ReportFilters,
    pub paths: ReportPaths,
    pub stats: RunStats,
    pub validation_issues: Vec<String>,
    pub overview: ComplianceOverview,
    pub summaries: Vec<GroupReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedTableEntry {
    pub manifest_version: u32,
    pub fingerprint: String,
    pub source_path: String,
    pub cached_at: String,
    pub table: RawTable,
}
