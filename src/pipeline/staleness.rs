use super::*;

pub fn normalize_status(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

// Dates after the reference date count as inspected today so that a
// negative count can never collide with the never-inspected sentinel.
pub fn elapsed_since(inspection_date: Option<NaiveDate>, reference_date: NaiveDate) -> Elapsed {
    match inspection_date {
        Some(date) => Elapsed::Days((reference_date - date).num_days().max(0)),
        None => Elapsed::Never,
    }
}

pub fn classify(
    records: Vec<InspectionRecord>,
    reference_date: NaiveDate,
    overdue_after_days: i64,
) -> Vec<ResolvedStatus> {
    records
        .into_iter()
        .map(|record| {
            if let Some(date) = record
                .inspection_date
                .filter(|date| *date > reference_date)
            {
                warn!(
                    key = %record.key,
                    inspection_date = %date,
                    reference_date = %reference_date,
                    "inspection date is after the reference date"
                );
            }

            let elapsed = elapsed_since(record.inspection_date, reference_date);
            let overdue = match elapsed {
                Elapsed::Days(days) => days > overdue_after_days,
                Elapsed::Never => false,
            };

            ResolvedStatus {
                record,
                elapsed,
                overdue,
            }
        })
        .collect()
}
