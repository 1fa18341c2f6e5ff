use tracing::{info, warn};

/// Which `EventStore` backend the context is wired with. Resolved once at
/// startup; there is no runtime driver switching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// SQL rows with eagerly materialized occurrence rows.
    Database,
    /// IMAP folders with one document per event and virtual occurrences.
    Imap,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the application to run on
    pub port: usize,
    /// Selected storage backend
    pub store: StoreKind,
    /// IMAP endpoint for the document backend
    pub imap_host: String,
    pub imap_port: u16,
    pub imap_user: String,
    pub imap_password: String,
    /// Root folder under which calendar folders live on the IMAP server
    pub imap_calendar_root: String,
    /// Optional URL pinged (best effort) after document-store writes so the
    /// free/busy service can recompute
    pub freebusy_trigger_url: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        let default_port = "5000";
        let port = std::env::var("PORT").unwrap_or_else(|_| default_port.into());
        let port = match port.parse::<usize>() {
            Ok(port) => port,
            Err(_) => {
                warn!(
                    "The given PORT: {} is not valid, falling back to the default port: {}.",
                    port, default_port
                );
                default_port.parse::<usize>().unwrap()
            }
        };

        let store = match std::env::var("ALMANAC_STORE").as_deref() {
            Ok("imap") => StoreKind::Imap,
            Ok("database") => StoreKind::Database,
            Ok(other) => {
                warn!(
                    "Unknown ALMANAC_STORE: {}, falling back to the database backend.",
                    other
                );
                StoreKind::Database
            }
            Err(_) => {
                info!("ALMANAC_STORE not set, using the database backend.");
                StoreKind::Database
            }
        };

        Self {
            port,
            store,
            imap_host: std::env::var("IMAP_HOST").unwrap_or_else(|_| "localhost".into()),
            imap_port: std::env::var("IMAP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(993),
            imap_user: std::env::var("IMAP_USER").unwrap_or_default(),
            imap_password: std::env::var("IMAP_PASSWORD").unwrap_or_default(),
            imap_calendar_root: std::env::var("IMAP_CALENDAR_ROOT")
                .unwrap_or_else(|_| "Calendar".into()),
            freebusy_trigger_url: std::env::var("FREEBUSY_TRIGGER_URL").ok(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
