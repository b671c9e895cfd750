use std::collections::hash_map::Entry;

use super::*;

/// Reduces the records to one per identity key.
///
/// A dated record always outranks an undated one. Among dated records the
/// latest inspection date wins, and on equal dates the earliest source row
/// wins. Undated records survive only for keys that never had a dated
/// record, again keeping the earliest source row.
///
/// Dated winners come first, newest date first; undated winners follow in
/// source order.
pub fn resolve_latest(records: Vec<InspectionRecord>) -> Vec<InspectionRecord> {
    let mut dated = HashMap::<IdentityKey, InspectionRecord>::new();
    let mut undated = Vec::<InspectionRecord>::new();

    for record in records {
        let Some(date) = record.inspection_date else {
            undated.push(record);
            continue;
        };

        match dated.entry(record.key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if slot.get().inspection_date < Some(date) {
                    slot.insert(record);
                }
            }
        }
    }

    let mut seen_undated = HashSet::<IdentityKey>::new();
    let undated = undated
        .into_iter()
        .filter(|record| !dated.contains_key(&record.key) && seen_undated.insert(record.key.clone()))
        .collect::<Vec<InspectionRecord>>();

    let mut latest = dated.into_values().collect::<Vec<InspectionRecord>>();
    latest.sort_by(|a, b| {
        b.inspection_date
            .cmp(&a.inspection_date)
            .then(a.source_row.cmp(&b.source_row))
    });
    latest.extend(undated);
    latest
}
