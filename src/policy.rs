use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::ColumnRole;

pub const DEFAULT_OVERDUE_AFTER_DAYS: i64 = 180;
pub const DEFAULT_OK_STATUS: &str = "OK";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("required column role '{role}' has no header matcher configured")]
    EmptyMatcher { role: ColumnRole },
    #[error("invalid header pattern for column role '{role}': {source}")]
    InvalidPattern {
        role: ColumnRole,
        #[source]
        source: regex::Error,
    },
    #[error("ok status literal must not be blank")]
    BlankOkStatus,
    #[error("overdue threshold must not be negative: {0}")]
    NegativeThreshold(i64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompliancePolicy {
    pub overdue_after_days: i64,
    pub ok_status: String,
    pub columns: ColumnAliases,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self {
            overdue_after_days: DEFAULT_OVERDUE_AFTER_DAYS,
            ok_status: DEFAULT_OK_STATUS.to_string(),
            columns: ColumnAliases::default(),
        }
    }
}

/// Header matchers per column role. A header matches a role when it equals
/// one of `exact`, contains one of `contains` (both compared trimmed and
/// upper-cased), or matches one of the regex `patterns`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleAliases {
    pub exact: Vec<String>,
    pub contains: Vec<String>,
    pub patterns: Vec<String>,
}

impl RoleAliases {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.contains.is_empty() && self.patterns.is_empty()
    }

    fn contains_marker(marker: &str) -> Self {
        Self {
            contains: vec![marker.to_string()],
            ..Self::default()
        }
    }

    fn exact_aliases(aliases: &[&str]) -> Self {
        Self {
            exact: aliases.iter().map(|alias| alias.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub technician: RoleAliases,
    pub product: RoleAliases,
    pub inspection_date: RoleAliases,
    pub manager: RoleAliases,
    pub coordinator: RoleAliases,
    pub status: RoleAliases,
}

impl ColumnAliases {
    pub fn for_role(&self, role: ColumnRole) -> &RoleAliases {
        match role {
            ColumnRole::Technician => &self.technician,
            ColumnRole::Product => &self.product,
            ColumnRole::InspectionDate => &self.inspection_date,
            ColumnRole::Manager => &self.manager,
            ColumnRole::Coordinator => &self.coordinator,
            ColumnRole::Status => &self.status,
        }
    }
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            technician: RoleAliases::contains_marker("TECNICO"),
            product: RoleAliases::contains_marker("PRODUTO"),
            inspection_date: RoleAliases::contains_marker("INSPECAO"),
            manager: RoleAliases::exact_aliases(&["GERENTE", "GERENTE_IMEDIATO"]),
            coordinator: RoleAliases::exact_aliases(&["COORDENADOR", "COORDENADOR_IMEDIATO"]),
            status: RoleAliases::exact_aliases(&["SITUAÇÃO CHECK LIST", "STATUS CHECK LIST"]),
        }
    }
}

impl CompliancePolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.ok_status.trim().is_empty() {
            return Err(PolicyError::BlankOkStatus);
        }
        if self.overdue_after_days < 0 {
            return Err(PolicyError::NegativeThreshold(self.overdue_after_days));
        }
        Ok(())
    }
}

pub fn load_policy(path: Option<&Path>) -> Result<CompliancePolicy> {
    let Some(path) = path else {
        return Ok(CompliancePolicy::default());
    };

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let policy: CompliancePolicy = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    info!(
        path = %path.display(),
        overdue_after_days = policy.overdue_after_days,
        ok_status = %policy.ok_status,
        "loaded compliance policy"
    );

    Ok(policy)
}

#[cfg(test)]
mod tests {
    use super::{CompliancePolicy, DEFAULT_OVERDUE_AFTER_DAYS, PolicyError};

    #[test]
    fn partial_policy_falls_back_to_defaults() {
        let raw = r#"
        {
          "ok_status": "conforme",
          "columns": {
            "manager": { "exact": ["SUPERVISOR"] }
          }
        }
        "#;

        let policy: CompliancePolicy =
            serde_json::from_str(raw).expect("partial policy should deserialize");
        assert_eq!(policy.overdue_after_days, DEFAULT_OVERDUE_AFTER_DAYS);
        assert_eq!(policy.ok_status, "conforme");
        assert_eq!(policy.columns.manager.exact, vec!["SUPERVISOR".to_string()]);
        assert_eq!(policy.columns.technician.contains, vec!["TECNICO".to_string()]);
        assert!(policy.columns.coordinator.exact.contains(&"COORDENADOR".to_string()));
    }

    #[test]
    fn validate_rejects_blank_ok_status_and_negative_threshold() {
        let blank = CompliancePolicy {
            ok_status: "  ".to_string(),
            ..CompliancePolicy::default()
        };
        assert!(matches!(blank.validate(), Err(PolicyError::BlankOkStatus)));

        let negative = CompliancePolicy {
            overdue_after_days: -3,
            ..CompliancePolicy::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(PolicyError::NegativeThreshold(-3))
        ));

        assert!(CompliancePolicy::default().validate().is_ok());
    }
}
