use crate::datetime::{DateResolver, ResolvedDate};
use crate::record::Record;

/// `[abc] Title`, plus ` - 3 PM` style suffix when the task's date names a
/// time of day and `timeless` is off.
pub fn format_task<R>(record: &Record, resolver: &R, timeless: bool) -> String
where
    R: DateResolver + ?Sized,
{
    if timeless {
        return format_resolved(record, None);
    }

    let resolved = record
        .date_text()
        .and_then(|text| resolver.resolve(&text));
    format_resolved(record, resolved.as_ref())
}

/// Formats with an already resolved date, so bucketed tasks are not parsed
/// twice.
pub fn format_resolved(record: &Record, resolved: Option<&ResolvedDate>) -> String {
    let base = format!("[{}] {}", record.identifier(), record.title());
    match resolved.and_then(ResolvedDate::time_label) {
        Some(label) => format!("{base} - {label}"),
        None => base,
    }
}
