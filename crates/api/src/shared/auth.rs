use crate::error::AlmanacError;
use actix_web::HttpRequest;
use almanac_domain::Session;
use chrono_tz::Tz;

const USER_ID_HEADER: &str = "x-almanac-user-id";
const USERNAME_HEADER: &str = "x-almanac-username";
const TIMEZONE_HEADER: &str = "x-almanac-timezone";

/// Reads the authenticated session the webmail shell attached to the
/// request. Authentication itself happens upstream; a request without the
/// session headers never made it through the shell.
pub fn protect_route(http_req: &HttpRequest) -> Result<Session, AlmanacError> {
    let header = |name: &str| {
        http_req
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };

    let user_id = header(USER_ID_HEADER)
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or_else(|| {
            AlmanacError::Unauthorized(format!("Missing or invalid {} header", USER_ID_HEADER))
        })?;
    let username = header(USERNAME_HEADER).ok_or_else(|| {
        AlmanacError::Unauthorized(format!("Missing {} header", USERNAME_HEADER))
    })?;
    let timezone = header(TIMEZONE_HEADER)
        .and_then(|v| v.parse::<Tz>().ok())
        .unwrap_or(chrono_tz::UTC);

    Ok(Session::new(user_id, username, timezone))
}
