use anyhow::Result;
use tracing::{info, warn};

use crate::cli::ExportPendingArgs;
use crate::commands::prepare_run;
use crate::table::write_csv_table;

pub fn run(args: ExportPendingArgs) -> Result<()> {
    let prepared = prepare_run(&args.source)?;

    if let Some(issue) = &prepared.run.validation_issue {
        warn!(issue = %issue, "exporting an empty pending table");
    }

    let pending = prepared.pipeline.pending(&prepared.resolved);
    write_csv_table(&args.output, &pending.to_raw_table())?;

    info!(
        path = %args.output.display(),
        pending = pending.len(),
        resolved = prepared.resolved.len(),
        "wrote pending inspections"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::NaiveDate;

    use super::run;
    use crate::cli::{ExportPendingArgs, SourceArgs};

    #[test]
    fn export_keeps_only_rows_that_are_not_ok() {
        let dir = tempfile::tempdir().expect("temp dir");
        let input = dir.path().join("epi.csv");
        fs::write(
            &input,
            "TECNICO;PRODUTO;DATA INSPECAO;SITUAÇÃO CHECK LIST\n\
             Ana;Luva;01/02/2024;ok\n\
             Bruno;Bota;;\n\
             Carla;Mascara;15/03/2024;Pendente\n",
        )
        .expect("source should write");
        let output = dir.path().join("pending.csv");

        run(ExportPendingArgs {
            source: SourceArgs {
                input,
                cache_root: dir.path().join("cache"),
                policy_path: None,
                reference_date: NaiveDate::from_ymd_opt(2024, 12, 31),
                no_cache: true,
                manager: None,
                coordinator: None,
            },
            output: output.clone(),
        })
        .expect("export should succeed");

        let exported = fs::read_to_string(&output).expect("export exists");
        let lines = exported.lines().collect::<Vec<&str>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Carla,Mascara"));
        assert!(lines[2].starts_with("Bruno,Bota"));
        assert!(lines[2].ends_with(",-1,false"));
        assert!(!dir.path().join("cache").exists());
    }
}
