use thiserror::Error;
use time::{Duration, UtcDateTime};

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }

    /// The instant this long after `start`.
    #[must_use]
    pub fn after(&self, start: UtcDateTime) -> UtcDateTime {
        start.saturating_add(self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The unix timestamp is out of range: {0}")]
pub struct InvalidTimestampError(pub i64);

#[cfg(test)]
mod tests {
    use crate::util::PositiveDuration;
    use time::{Duration, macros::utc_datetime};

    #[test]
    fn only_positive() {
        assert!(PositiveDuration::new(Duration::seconds(1)).is_some());
        assert!(PositiveDuration::new(Duration::ZERO).is_none());
        assert!(PositiveDuration::new(Duration::seconds(-5)).is_none());
    }

    #[test]
    fn after() {
        let day = PositiveDuration::new(Duration::days(1)).unwrap();

        assert_eq!(
            day.after(utc_datetime!(2026-10-16 08:30)),
            utc_datetime!(2026-10-17 08:30)
        );
    }
}
