use crate::models::{Record, RecordSet, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Per-group record count and mean of `value_column`.
///
/// Output columns are `[group_column, "Count", "Average"]`. Absent group
/// cells are grouped under "Unknown"; the mean covers only numeric cells and
/// is Absent when a group has none. Rows are sorted by count (desc), then
/// average (desc, Absent last), then group name.
pub fn group_summary(set: &RecordSet, group_column: &str, value_column: &str) -> RecordSet {
    #[derive(Default)]
    struct Acc {
        count: i64,
        sum: f64,
        numeric: usize,
    }

    let mut groups: HashMap<String, Acc> = HashMap::new();
    for record in set.records() {
        let key = match record.value(group_column) {
            Value::Absent => "Unknown".to_string(),
            v => v.to_cell(),
        };
        let acc = groups.entry(key).or_default();
        acc.count += 1;
        if let Some(x) = record.value(value_column).as_f64() {
            acc.sum += x;
            acc.numeric += 1;
        }
    }

    let mut rows: Vec<(String, i64, Option<f64>)> = groups
        .into_iter()
        .map(|(k, a)| {
            let mean = (a.numeric > 0).then(|| a.sum / a.numeric as f64);
            (k, a.count, mean)
        })
        .collect();

    rows.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| match (a.2, b.2) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.0.cmp(&b.0))
    });

    let columns = vec![group_column.to_string(), "Count".to_string(), "Average".to_string()];
    let records = rows
        .into_iter()
        .map(|(group, count, mean)| {
            Record::new()
                .with(group_column, Value::Text(group))
                .with("Count", Value::Integer(count))
                .with("Average", Value::from_f64(mean))
        })
        .collect();
    RecordSet::from_parts(columns, records)
}
