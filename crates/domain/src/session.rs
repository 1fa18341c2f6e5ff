use chrono_tz::Tz;

/// Execution context of a single request: the authenticated user and their
/// timezone preference. Passed explicitly into every store operation instead
/// of living in ambient globals; the surrounding webmail shell owns the
/// actual authentication.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
    pub timezone: Tz,
}

impl Session {
    pub fn new(user_id: i64, username: impl Into<String>, timezone: Tz) -> Self {
        Self {
            user_id,
            username: username.into(),
            timezone,
        }
    }
}
