use almanac_domain::CalendarId;
use serde_json::json;
use tracing::warn;

/// Best-effort trigger telling the free/busy service to recompute after a
/// document-store write. Decoupled from the write itself: the write is
/// already committed, so a failed ping is logged and never surfaced.
#[derive(Clone)]
pub struct FreeBusyNotifier {
    url: Option<String>,
    client: reqwest::Client,
}

impl FreeBusyNotifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn ping(&self, source: &CalendarId) {
        let url = match &self.url {
            Some(url) => url.clone(),
            None => return,
        };
        let client = self.client.clone();
        let source = source.to_string();
        tokio::spawn(async move {
            let result = client
                .post(&url)
                .json(&json!({ "source": source }))
                .send()
                .await;
            if let Err(e) = result {
                warn!("free/busy trigger failed for {}: {}", source, e);
            }
        });
    }
}
