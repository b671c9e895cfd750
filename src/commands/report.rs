use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::ReportArgs;
use crate::commands::prepare_run;
use crate::model::{ComplianceReport, GroupReport, ReportPaths, ReportPolicy};
use crate::pipeline::GroupBy;
use crate::table::write_csv_table;
use crate::util::{now_utc_string, utc_compact_string, write_json_pretty};

const REPORT_MANIFEST_VERSION: u32 = 1;

pub fn run(args: ReportArgs) -> Result<()> {
    let started_ts = Utc::now();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| args.source.cache_root.join("reports"));
    let resolved_csv_path = output_dir.join("resolved.csv");
    let pending_csv_path = output_dir.join("pending.csv");
    let report_path = output_dir.join("compliance_report.json");

    info!(run_id = %run_id, input = %args.source.input.display(), "starting compliance report");

    let prepared = prepare_run(&args.source)?;
    let pipeline = &prepared.pipeline;

    let validation_issues = prepared
        .run
        .validation_issue
        .iter()
        .map(|issue| issue.to_string())
        .collect::<Vec<String>>();
    for issue in &validation_issues {
        warn!(issue = %issue, "report continues with an empty resolved table");
    }

    let group_bys = if args.group_by.is_empty() {
        vec![GroupBy::Manager, GroupBy::Coordinator]
    } else {
        args.group_by
            .iter()
            .map(|value| GroupBy::from_arg(value))
            .collect()
    };

    let mut summaries = Vec::with_capacity(group_bys.len());
    for group_by in &group_bys {
        let groups = pipeline
            .summarize(&prepared.resolved, group_by)
            .with_context(|| format!("failed to group by {}", group_by.column_name()))?;
        summaries.push(GroupReport {
            group_column: group_by.column_name().to_string(),
            groups,
        });
    }

    let overview = pipeline.overview(&prepared.resolved);
    let pending = pipeline.pending(&prepared.resolved);

    write_csv_table(&resolved_csv_path, &prepared.resolved.to_raw_table())?;
    write_csv_table(&pending_csv_path, &pending.to_raw_table())?;

    let report = ComplianceReport {
        manifest_version: REPORT_MANIFEST_VERSION,
        run_id,
        generated_at: now_utc_string(),
        reference_date: prepared.reference_date.format("%Y-%m-%d").to_string(),
        source_fingerprint: prepared.loaded.fingerprint.clone(),
        cache_hit: prepared.loaded.cache_hit,
        policy: ReportPolicy {
            overdue_after_days: pipeline.overdue_after_days(),
            ok_status: pipeline.ok_status().to_string(),
        },
        filters: prepared.filters.clone(),
        paths: ReportPaths {
            source_path: args.source.input.display().to_string(),
            resolved_csv_path: resolved_csv_path.display().to_string(),
            pending_csv_path: pending_csv_path.display().to_string(),
        },
        stats: prepared.run.stats.clone(),
        validation_issues,
        overview,
        summaries,
    };

    write_json_pretty(&report_path, &report)?;

    info!(
        total = report.overview.total,
        ok = report.overview.ok,
        pending = report.overview.pending,
        overdue = report.overview.overdue,
        never_inspected = report.overview.never_inspected,
        percent_ok = report.overview.percent_ok,
        "compliance overview"
    );
    for summary in &report.summaries {
        for group in &summary.groups {
            info!(
                group_column = %summary.group_column,
                group = %group.label,
                total = group.total,
                ok = group.ok,
                pending = group.pending,
                percent_ok = group.percent_ok,
                percent_pending = group.percent_pending,
                "group compliance"
            );
        }
    }
    info!(path = %report_path.display(), "wrote compliance report");

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&report).context("failed to render report json")?;
        println!("{rendered}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use chrono::NaiveDate;

    use super::run;
    use crate::cli::{ReportArgs, SourceArgs};

    const SOURCE: &str = "\
TECNICO,PRODUTO,DATA INSPECAO,SITUAÇÃO CHECK LIST,GERENTE,COORDENADOR
Ana,Capacete,2024-01-01,OK,M1,C1
Ana,Capacete,2024-06-01,PENDENTE,M1,C1
 ana ,capacete,,,M1,C1
Bruno,Luva,,OK,M2,
Carla,Bota,2024-12-01,OK,M1,C2
";

    fn source_args(dir: &Path, input: &str) -> SourceArgs {
        let input_path = dir.join("epi.csv");
        fs::write(&input_path, input).expect("source should write");
        SourceArgs {
            input: input_path,
            cache_root: dir.join("cache"),
            policy_path: None,
            reference_date: NaiveDate::from_ymd_opt(2024, 12, 31),
            no_cache: false,
            manager: None,
            coordinator: None,
        }
    }

    fn read_report(dir: &Path) -> serde_json::Value {
        let raw = fs::read(dir.join("out").join("compliance_report.json")).expect("report exists");
        serde_json::from_slice(&raw).expect("report should be json")
    }

    #[test]
    fn report_writes_summaries_and_tables() {
        let dir = tempfile::tempdir().expect("temp dir");
        let args = ReportArgs {
            source: source_args(dir.path(), SOURCE),
            group_by: Vec::new(),
            output_dir: Some(dir.path().join("out")),
            json: false,
        };

        run(args).expect("report should succeed");
        let report = read_report(dir.path());

        assert_eq!(report["reference_date"], "2024-12-31");
        assert_eq!(report["stats"]["input_rows"], 5);
        assert_eq!(report["stats"]["resolved_rows"], 3);
        assert_eq!(report["overview"]["total"], 3);
        assert_eq!(report["overview"]["ok"], 2);
        assert_eq!(report["overview"]["never_inspected"], 1);

        let manager = &report["summaries"][0];
        assert_eq!(manager["group_column"], "GERENTE_IMEDIATO");
        assert_eq!(manager["groups"][0]["label"], "M1");
        assert_eq!(manager["groups"][0]["total"], 2);
        assert_eq!(manager["groups"][0]["percent_ok"], 50.0);

        let coordinator = &report["summaries"][1];
        assert_eq!(coordinator["groups"][2]["label"], "(unspecified)");

        let pending = fs::read_to_string(dir.path().join("out").join("pending.csv"))
            .expect("pending export exists");
        assert_eq!(pending.lines().count(), 2);
        assert!(pending.contains("PENDENTE"));
    }

    #[test]
    fn missing_column_produces_empty_report_instead_of_failing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let args = ReportArgs {
            source: source_args(dir.path(), "TECNICO,EQUIPAMENTO\nAna,Luva\n"),
            group_by: vec!["manager".to_string()],
            output_dir: Some(dir.path().join("out")),
            json: false,
        };

        run(args).expect("validation failure is not fatal");
        let report = read_report(dir.path());

        assert_eq!(report["overview"]["total"], 0);
        assert_eq!(report["summaries"][0]["groups"].as_array().map(Vec::len), Some(0));
        let issue = report["validation_issues"][0].as_str().unwrap_or_default();
        assert!(issue.contains("product"), "unexpected issue: {issue}");
    }

    #[test]
    fn manager_filter_narrows_the_report() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut source = source_args(dir.path(), SOURCE);
        source.manager = Some("m2".to_string());
        let args = ReportArgs {
            source,
            group_by: vec!["coordinator".to_string()],
            output_dir: Some(dir.path().join("out")),
            json: false,
        };

        run(args).expect("report should succeed");
        let report = read_report(dir.path());

        assert_eq!(report["filters"]["manager"], "m2");
        assert_eq!(report["overview"]["total"], 1);
        assert_eq!(report["summaries"][0]["groups"][0]["label"], "(unspecified)");
    }
}
