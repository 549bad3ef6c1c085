use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{self, Duration, SystemTime, UNIX_EPOCH},
};
/// represent current time with seconds and fraction of a second in nanoseconds
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub struct TimeDurationStruct {
    /// seconds
    pub sec: u64,
    /// fraction of a second in nanoseconds
    pub nsec: u32,
}

/// calculate what time is it since `1970-1-1 00:00:00`,named as [UNIX_EPOCH]
pub fn now() -> TimeDurationStruct {
    let now = SystemTime::now()
        .duration_since(time::UNIX_EPOCH)
        .unwrap_or_default();
    TimeDurationStruct {
        sec: now.as_secs(),
        nsec: now.subsec_nanos(),
    }
}

impl TimeDurationStruct {
    pub fn is_unset(&self) -> bool {
        *self == TimeDurationStruct::default()
    }
}

impl From<TimeDurationStruct> for SystemTime {
    fn from(value: TimeDurationStruct) -> Self {
        let duration = Duration::new(value.sec, value.nsec);
        UNIX_EPOCH + duration
    }
}

impl fmt::Display for TimeDurationStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unset() {
            write!(f, "never")
        } else {
            write!(f, "{}.{:09}", self.sec, self.nsec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_after_epoch() {
        let t = now();
        assert!(!t.is_unset());
        let system_time: SystemTime = t.into();
        assert!(system_time > UNIX_EPOCH);
    }

    #[test]
    fn test_display() {
        assert_eq!(TimeDurationStruct::default().to_string(), "never");
        let t = TimeDurationStruct { sec: 5, nsec: 42 };
        assert_eq!(t.to_string(), "5.000000042");
    }
}
