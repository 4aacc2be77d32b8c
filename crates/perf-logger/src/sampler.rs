// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sampling tick: snapshot, staleness gate, row.

use crate::row::{PerfRow, RowSettings, PATH_DATETIME, SAMPLED_PATHS};
use crate::source::{ReadingSource, Snapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Generation time of the navigation timestamp reading.
///
/// Uses the reading's own timestamp, falling back to its value parsed as
/// RFC 3339.
pub fn sample_timestamp(snapshot: &Snapshot) -> Option<DateTime<Utc>> {
    let reading = snapshot.get(PATH_DATETIME)?;
    reading.timestamp.or_else(|| {
        reading
            .as_text()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
    })
}

/// `true` when `now - sample < period`. Samples from the future are fresh.
pub fn is_fresh(sample: DateTime<Utc>, now: DateTime<Utc>, period: Duration) -> bool {
    match now.signed_duration_since(sample).to_std() {
        Ok(age) => age < period,
        Err(_) => true,
    }
}

/// Produces rows from a reading source.
pub struct Sampler {
    source: Arc<dyn ReadingSource>,
    context: String,
    settings: RowSettings,
    period: Duration,
}

impl Sampler {
    pub fn new(
        source: Arc<dyn ReadingSource>,
        context: impl Into<String>,
        settings: RowSettings,
        period: Duration,
    ) -> Self {
        Self {
            source,
            context: context.into(),
            settings,
            period,
        }
    }

    /// Sampling period (also the staleness threshold).
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Take one sample. `None` when the data is stale or has no timestamp.
    pub fn sample(&self, now: DateTime<Utc>) -> Option<PerfRow> {
        let snapshot = self.source.snapshot(&self.context, &SAMPLED_PATHS);
        let sampled_at = sample_timestamp(&snapshot)?;
        if !is_fresh(sampled_at, now, self.period) {
            tracing::trace!(%sampled_at, %now, "skipping stale sample");
            return None;
        }
        Some(PerfRow::from_snapshot(&snapshot, sampled_at, &self.settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{Column, PATH_SOG};
    use crate::source::{Reading, SignalKModel};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn settings() -> RowSettings {
        RowSettings {
            model: "m".into(),
            sail_config: "c".into(),
            engine: "e".into(),
        }
    }

    fn sampler(model: Arc<SignalKModel>) -> Sampler {
        Sampler::new(model, "vessels.self", settings(), Duration::from_secs(300))
    }

    #[test]
    fn test_is_fresh_boundaries() {
        let period = Duration::from_secs(300);
        assert!(is_fresh(now(), now(), period));
        assert!(is_fresh(now() - ChronoDuration::seconds(299), now(), period));
        assert!(!is_fresh(now() - ChronoDuration::seconds(300), now(), period));
        assert!(!is_fresh(now() - ChronoDuration::minutes(10), now(), period));
        assert!(is_fresh(now() + ChronoDuration::seconds(5), now(), period));
    }

    #[test]
    fn test_sample_timestamp_prefers_reading_timestamp() {
        let ts = now() - ChronoDuration::seconds(3);
        let snap = Snapshot::new().with(PATH_DATETIME, Reading::text("garbage").at(ts));
        assert_eq!(sample_timestamp(&snap), Some(ts));

        let snap = Snapshot::new().with(PATH_DATETIME, Reading::text("2024-06-01T11:59:00Z"));
        assert_eq!(
            sample_timestamp(&snap),
            Some(now() - ChronoDuration::seconds(60))
        );

        assert_eq!(sample_timestamp(&Snapshot::new()), None);
    }

    #[test]
    fn test_stale_sample_suppressed() {
        let model = Arc::new(SignalKModel::new("vessels.self"));
        let old = now() - ChronoDuration::minutes(10);
        model.set(
            "vessels.self",
            PATH_DATETIME,
            Reading::text(old.to_rfc3339()).at(old),
        );
        model.set("vessels.self", PATH_SOG, Reading::number(5.0).at(old));

        assert!(sampler(model).sample(now()).is_none());
    }

    #[test]
    fn test_missing_timestamp_suppressed() {
        let model = Arc::new(SignalKModel::new("vessels.self"));
        model.set("vessels.self", PATH_SOG, Reading::number(5.0));
        assert!(sampler(model).sample(now()).is_none());
    }

    #[test]
    fn test_fresh_sample_produces_row() {
        let model = Arc::new(SignalKModel::new("vessels.self"));
        let ts = now() - ChronoDuration::seconds(1);
        model.set("vessels.self", PATH_DATETIME, Reading::text("x").at(ts));
        model.set("vessels.self", PATH_SOG, Reading::number(5.0));

        let row = sampler(model).sample(now()).expect("row");
        assert_eq!(row.time, ts);
        assert_eq!(row.field(Column::Sog), "9.72");
        assert_eq!(row.field(Column::Model), "m");
    }

    #[test]
    fn test_other_context_not_sampled() {
        let model = Arc::new(SignalKModel::new("vessels.self"));
        model.set("vessels.other", PATH_DATETIME, Reading::text("x").at(now()));
        assert!(sampler(model).sample(now()).is_none());
    }
}
