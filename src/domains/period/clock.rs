use chrono::{DateTime, NaiveDate, Utc};

/// Time source for period derivation.
///
/// Services never read wall-clock time directly; they take a `Clock` so
/// "current period as of today" stays deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Real-time clock backed by the system UTC time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed date, for tests and reproducible reports.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(
            self.0.and_hms_opt(12, 0, 0).expect("valid midday time"),
            Utc,
        )
    }

    fn today(&self) -> NaiveDate {
        self.0
    }
}
