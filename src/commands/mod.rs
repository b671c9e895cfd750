use std::env;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing::info;

use crate::cache::{LoadCache, LoadedSource, load_uncached};
use crate::cli::SourceArgs;
use crate::model::{ReportFilters, ResolvedTable};
use crate::pipeline::{GroupBy, Pipeline, PipelineRun, filter_group};
use crate::policy::load_policy;

pub mod cache_status;
pub mod export;
pub mod report;

const REFERENCE_DATE_ENV: &str = "EPI_REFERENCE_DATE";

pub(crate) struct PreparedRun {
    pub pipeline: Pipeline,
    pub loaded: LoadedSource,
    pub reference_date: NaiveDate,
    pub run: PipelineRun,
    pub resolved: ResolvedTable,
    pub filters: ReportFilters,
}

pub(crate) fn prepare_run(args: &SourceArgs) -> Result<PreparedRun> {
    let policy = load_policy(args.policy_path.as_deref())?;
    let pipeline = Pipeline::new(&policy).context("invalid compliance policy")?;

    let loaded = if args.no_cache {
        load_uncached(&args.input)?
    } else {
        LoadCache::new(&args.cache_root).load(&args.input)?
    };
    let reference_date = resolve_reference_date(args.reference_date)?;

    info!(
        input = %args.input.display(),
        fingerprint = %loaded.fingerprint,
        cache_hit = loaded.cache_hit,
        reference_date = %reference_date,
        "loaded inspection table"
    );

    let run = pipeline.run(&loaded.table, reference_date);

    let mut resolved = run.resolved.clone();
    if let Some(manager) = args.manager.as_deref() {
        resolved = filter_group(&resolved, &GroupBy::Manager, manager)?;
    }
    if let Some(coordinator) = args.coordinator.as_deref() {
        resolved = filter_group(&resolved, &GroupBy::Coordinator, coordinator)?;
    }
    if args.manager.is_some() || args.coordinator.is_some() {
        info!(
            rows = resolved.len(),
            of = run.resolved.len(),
            "applied group filters"
        );
    }

    Ok(PreparedRun {
        pipeline,
        loaded,
        reference_date,
        run,
        resolved,
        filters: ReportFilters {
            manager: args.manager.clone(),
            coordinator: args.coordinator.clone(),
        },
    })
}

fn resolve_reference_date(explicit: Option<NaiveDate>) -> Result<NaiveDate> {
    if let Some(date) = explicit {
        return Ok(date);
    }

    match env::var(REFERENCE_DATE_ENV) {
        Ok(value) if !value.trim().is_empty() => {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .with_context(|| format!("invalid {REFERENCE_DATE_ENV}: {value}"))
        }
        _ => Ok(Local::now().date_naive()),
    }
}
