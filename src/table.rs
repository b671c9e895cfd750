use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use tracing::debug;

use crate::model::RawTable;
use crate::util::ensure_directory;

const UTF8_BOM: char = '\u{feff}';

// Spreadsheet exports in pt-BR locales separate fields with ';'.
pub fn detect_delimiter(data: &[u8]) -> u8 {
    let header_line = data.split(|byte| *byte == b'\n').next().unwrap_or_default();
    let semicolons = header_line.iter().filter(|byte| **byte == b';').count();
    let commas = header_line.iter().filter(|byte| **byte == b',').count();
    if semicolons > commas { b';' } else { b',' }
}

pub fn parse_csv_table(data: &[u8]) -> Result<RawTable> {
    let delimiter = detect_delimiter(data);
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .context("failed to read csv header row")?
        .iter()
        .enumerate()
        .map(|(index, header)| {
            let header = if index == 0 {
                header.trim_start_matches(UTF8_BOM)
            } else {
                header
            };
            header.trim().to_string()
        })
        .collect::<Vec<String>>();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("failed to read csv record {}", index + 1))?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let row = (0..headers.len())
            .map(|column| record.get(column).unwrap_or_default().to_string())
            .collect::<Vec<String>>();
        rows.push(row);
    }

    debug!(
        columns = headers.len(),
        rows = rows.len(),
        delimiter = %char::from(delimiter),
        "parsed csv table"
    );

    Ok(RawTable::new(headers, rows))
}

pub fn write_csv_table(path: &Path, table: &RawTable) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("failed to create csv file: {}", path.display()))?;

    writer
        .write_record(&table.headers)
        .with_context(|| format!("failed to write csv header: {}", path.display()))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .with_context(|| format!("failed to write csv row: {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush csv file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{detect_delimiter, parse_csv_table, write_csv_table};
    use crate::model::RawTable;

    #[test]
    fn parse_csv_table_trims_headers_and_pads_short_rows() {
        let data = "\u{feff} TECNICO ,PRODUTO,DATA INSPECAO\nAna,Capacete\nBruno,Luva,2024-01-02,extra\n,,\n";

        let table = parse_csv_table(data.as_bytes()).expect("csv should parse");
        assert_eq!(table.headers, vec!["TECNICO", "PRODUTO", "DATA INSPECAO"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Ana", "Capacete", ""]);
        assert_eq!(table.rows[1], vec!["Bruno", "Luva", "2024-01-02"]);
    }

    #[test]
    fn semicolon_exports_are_detected() {
        assert_eq!(detect_delimiter(b"TECNICO;PRODUTO;DATA\nAna;Luva;01/02/2024"), b';');
        assert_eq!(detect_delimiter(b"TECNICO,PRODUTO\n"), b',');

        let table = parse_csv_table("TECNICO;PRODUTO\nAna;Bota, cano longo\n".as_bytes())
            .expect("csv should parse");
        assert_eq!(table.rows[0], vec!["Ana", "Bota, cano longo"]);
    }

    #[test]
    fn written_tables_read_back() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out").join("pending.csv");
        let table = RawTable::new(
            vec!["TECNICO".to_string(), "PRODUTO".to_string()],
            vec![vec!["Ana".to_string(), "Luva, nitrilica".to_string()]],
        );

        write_csv_table(&path, &table).expect("csv should write");
        let data = std::fs::read(&path).expect("csv should exist");
        assert_eq!(parse_csv_table(&data).expect("csv should parse"), table);
    }
}
