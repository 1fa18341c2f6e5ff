use chrono::{DateTime, Utc};

/// Clock abstraction so tests can pin "now".
pub trait ISys: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct RealSys {}

impl ISys for RealSys {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for tests.
pub struct FixedSys(pub DateTime<Utc>);

impl ISys for FixedSys {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
