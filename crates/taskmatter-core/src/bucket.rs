use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, trace};

use crate::datetime::{DateResolver, ResolvedDate};
use crate::format::format_resolved;
use crate::record::Record;

/// A record together with the date it was bucketed under.
#[derive(Debug, Clone, Copy)]
pub struct Scheduled<'a> {
    pub record: &'a Record,
    pub resolved: ResolvedDate,
}

impl Scheduled<'_> {
    pub fn display(&self) -> String {
        format_resolved(self.record, Some(&self.resolved))
    }
}

/// Records grouped by calendar day, each bucket in input order.
#[derive(Debug, Clone, Default)]
pub struct BucketMap<'a> {
    days: BTreeMap<NaiveDate, Vec<Scheduled<'a>>>,
}

impl<'a> BucketMap<'a> {
    #[tracing::instrument(level = "debug", skip_all, fields(records = records.len()))]
    pub fn build<R>(records: &'a [Record], resolver: &R) -> Self
    where
        R: DateResolver + ?Sized,
    {
        let mut days: BTreeMap<NaiveDate, Vec<Scheduled<'a>>> = BTreeMap::new();
        let mut skipped = 0_usize;

        for record in records {
            let Some(resolved) = resolve_record(record, resolver) else {
                trace!(id = record.identifier(), "no resolvable date; skipping");
                skipped += 1;
                continue;
            };
            days.entry(resolved.date)
                .or_default()
                .push(Scheduled { record, resolved });
        }

        debug!(days = days.len(), skipped, "bucketed records by day");
        Self { days }
    }

    pub fn get(&self, day: NaiveDate) -> &[Scheduled<'a>] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or_default()
    }
}

/// `planned` first; `due` when `planned` is absent or does not resolve.
pub fn resolve_record<R>(record: &Record, resolver: &R) -> Option<ResolvedDate>
where
    R: DateResolver + ?Sized,
{
    record
        .planned()
        .and_then(|text| resolver.resolve(&text))
        .or_else(|| record.due().and_then(|text| resolver.resolve(&text)))
}
