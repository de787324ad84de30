use domain::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

/// 时钟回拨时保持时间戳单调不减。
#[derive(Debug, Default)]
pub(crate) struct MonotonicStamp {
    last: Option<Timestamp>,
}

impl MonotonicStamp {
    pub(crate) fn stamp(&mut self, now: Timestamp) -> Timestamp {
        let stamped = match self.last {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last = Some(stamped);
        stamped
    }
}
