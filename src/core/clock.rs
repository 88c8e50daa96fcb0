use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Offset, TimeZone, Utc};
use std::sync::Mutex;

/// Source of wall-clock time for the engine.
///
/// The offset decides where the calendar day boundary falls for the daily
/// booster allowance.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn offset(&self) -> FixedOffset;

    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&self.offset()).date_naive()
    }

    /// Midnight at the start of the current local day.
    fn start_of_today(&self) -> DateTime<FixedOffset> {
        let offset = self.offset();
        let midnight = self.today().and_hms_opt(0, 0, 0).unwrap_or_default();
        offset
            .from_local_datetime(&midnight)
            .single()
            .unwrap_or_else(|| self.now().with_timezone(&offset))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn offset(&self) -> FixedOffset {
        Local::now().offset().fix()
    }
}

/// A clock that only moves when told to. Used by tests and by `simulate`.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_offset(start, Utc.fix())
    }

    pub fn with_offset(start: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(start),
            offset,
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn advance_ms(&self, millis: i64) {
        self.advance(Duration::milliseconds(millis));
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|now| *now)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(noon());
        clock.advance_ms(1500);
        assert_eq!(clock.now(), noon() + Duration::milliseconds(1500));
    }

    #[test]
    fn test_start_of_today_in_utc() {
        let clock = ManualClock::new(noon());
        let midnight = clock.start_of_today();
        assert_eq!(
            midnight.with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_start_of_today_respects_offset() {
        // 01:00 UTC is still the previous evening at UTC-5.
        let early = Utc.with_ymd_and_hms(2024, 6, 15, 1, 0, 0).unwrap();
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let clock = ManualClock::with_offset(early, offset);

        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 14).unwrap());
        assert_eq!(
            clock.start_of_today().with_timezone(&Utc),
            Utc.with_ymd_and_hms(2024, 6, 14, 5, 0, 0).unwrap()
        );
    }
}
