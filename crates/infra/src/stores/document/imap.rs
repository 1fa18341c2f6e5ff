use super::backend::{FolderBackend, FolderInfo};
use almanac_domain::Event;
use anyhow::Context;
use native_tls::TlsStream;
use std::net::TcpStream;
use tracing::warn;

type ImapSession = imap::Session<TlsStream<TcpStream>>;

#[derive(Clone)]
struct ImapConfig {
    host: String,
    port: u16,
    user: String,
    password: String,
    root: String,
}

/// IMAP implementation of the folder collaborator: one message per event
/// document (`Subject` header carries the UID, body is the JSON projection),
/// folder metadata via the METADATA extension, soft deletes via the
/// `\Deleted` flag without expunge.
///
/// The `imap` crate is blocking, so every operation opens a session inside
/// `spawn_blocking` and logs out when done.
pub struct ImapFolderBackend {
    config: ImapConfig,
}

impl ImapFolderBackend {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            config: ImapConfig {
                host: host.into(),
                port,
                user: user.into(),
                password: password.into(),
                root: root.into(),
            },
        }
    }

    async fn run<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut ImapSession, &ImapConfig) -> anyhow::Result<T> + Send + 'static,
    {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || {
            let mut session = connect(&config)?;
            let result = op(&mut session, &config);
            if let Err(e) = session.logout() {
                warn!("IMAP logout failed: {:?}", e);
            }
            result
        })
        .await
        .context("IMAP worker task failed")?
    }
}

fn connect(config: &ImapConfig) -> anyhow::Result<ImapSession> {
    let tls = native_tls::TlsConnector::builder().build()?;
    let client = imap::connect(
        (config.host.as_str(), config.port),
        config.host.as_str(),
        &tls,
    )
    .context("IMAP connect failed")?;
    client
        .login(&config.user, &config.password)
        .map_err(|e| anyhow::anyhow!("IMAP login failed: {:?}", e.0))
}

fn compose_message(event: &Event) -> anyhow::Result<Vec<u8>> {
    let body = serde_json::to_string(event)?;
    Ok(format!(
        "Subject: {}\r\nContent-Type: application/json; charset=utf-8\r\n\r\n{}",
        event.uid, body
    )
    .into_bytes())
}

fn parse_message(raw: &[u8]) -> Option<Event> {
    let text = std::str::from_utf8(raw).ok()?;
    let (_, body) = text.split_once("\r\n\r\n").or_else(|| text.split_once("\n\n"))?;
    match serde_json::from_str(body) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Skipping unparsable event document: {}", e);
            None
        }
    }
}

fn fetch_uids(session: &mut ImapSession, uids: Vec<u32>) -> anyhow::Result<Vec<Event>> {
    if uids.is_empty() {
        return Ok(Vec::new());
    }
    let set = uids
        .iter()
        .map(|u| u.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let fetches = session.uid_fetch(set, "BODY.PEEK[]")?;
    Ok(fetches.iter().filter_map(|f| f.body().and_then(parse_message)).collect())
}

/// Extracts the rights token from a `* MYRIGHTS` untagged response.
fn parse_myrights(response: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(response);
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("* MYRIGHTS ") {
            return rest.rsplit(' ').next().map(|s| s.trim_matches('"').to_string());
        }
    }
    None
}

/// Extracts the quoted value following `key` in a `* METADATA` response.
fn parse_metadata_value(response: &[u8], key: &str) -> Option<String> {
    let text = String::from_utf8_lossy(response);
    let idx = text.find(key)?;
    let rest = &text[idx + key.len()..];
    let open = rest.find('"')?;
    let rest = &rest[open + 1..];
    let close = rest.find('"')?;
    let value = &rest[..close];
    if value == "NIL" {
        None
    } else {
        Some(value.to_string())
    }
}

#[async_trait::async_trait]
impl FolderBackend for ImapFolderBackend {
    async fn list_folders(&self) -> anyhow::Result<Vec<FolderInfo>> {
        self.run(|session, config| {
            let pattern = format!("{}*", config.root);
            let names = session.list(Some(""), Some(&pattern))?;
            let subscribed: Vec<String> = session
                .lsub(Some(""), Some(&pattern))?
                .iter()
                .map(|n| n.name().to_string())
                .collect();

            let mut folders = Vec::new();
            for name in names.iter() {
                let folder = name.name().to_string();
                let rights = session
                    .run_command_and_read_response(&format!("MYRIGHTS \"{}\"", folder))
                    .ok()
                    .and_then(|r| parse_myrights(&r))
                    .unwrap_or_else(|| "lrswi".to_string());
                folders.push(FolderInfo {
                    subscribed: subscribed.contains(&folder),
                    name: folder,
                    // folders under the personal namespace belong to the
                    // logged-in user
                    owner: config.user.clone(),
                    rights,
                });
            }
            folders.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(folders)
        })
        .await
    }

    async fn create_folder(&self, name: &str) -> anyhow::Result<()> {
        let name = name.to_string();
        self.run(move |session, _| {
            session.create(&name)?;
            session.subscribe(&name)?;
            Ok(())
        })
        .await
    }

    async fn rename_folder(&self, old: &str, new: &str) -> anyhow::Result<()> {
        let (old, new) = (old.to_string(), new.to_string());
        self.run(move |session, _| {
            session.rename(&old, &new)?;
            Ok(())
        })
        .await
    }

    async fn delete_folder(&self, name: &str) -> anyhow::Result<()> {
        let name = name.to_string();
        self.run(move |session, _| {
            session.delete(&name)?;
            Ok(())
        })
        .await
    }

    async fn set_subscribed(&self, name: &str, subscribed: bool) -> anyhow::Result<()> {
        let name = name.to_string();
        self.run(move |session, _| {
            if subscribed {
                session.subscribe(&name)?;
            } else {
                session.unsubscribe(&name)?;
            }
            Ok(())
        })
        .await
    }

    async fn get_metadata(&self, folder: &str, key: &str) -> anyhow::Result<Option<String>> {
        let (folder, key) = (folder.to_string(), key.to_string());
        self.run(move |session, _| {
            let response = session
                .run_command_and_read_response(&format!("GETMETADATA \"{}\" ({})", folder, key))?;
            Ok(parse_metadata_value(&response, &key))
        })
        .await
    }

    async fn set_metadata(&self, folder: &str, key: &str, value: &str) -> anyhow::Result<()> {
        let (folder, key, value) = (folder.to_string(), key.to_string(), value.to_string());
        self.run(move |session, _| {
            session.run_command_and_read_response(&format!(
                "SETMETADATA \"{}\" ({} \"{}\")",
                folder, key, value
            ))?;
            Ok(())
        })
        .await
    }

    async fn list_objects(&self, folder: &str) -> anyhow::Result<Vec<Event>> {
        let folder = folder.to_string();
        self.run(move |session, _| {
            session.select(&folder)?;
            let uids: Vec<u32> = session.uid_search("NOT DELETED")?.into_iter().collect();
            fetch_uids(session, uids)
        })
        .await
    }

    async fn find_object(&self, folder: &str, uid: &str) -> anyhow::Result<Option<Event>> {
        let (folder, uid) = (folder.to_string(), uid.to_string());
        self.run(move |session, _| {
            session.select(&folder)?;
            let uids: Vec<u32> = session
                .uid_search(format!("HEADER SUBJECT \"{}\" NOT DELETED", uid))?
                .into_iter()
                .collect();
            let mut events = fetch_uids(session, uids)?;
            // header search is substring-based; insist on the exact uid
            events.retain(|e| e.uid == uid);
            Ok(events.into_iter().next())
        })
        .await
    }

    async fn save_object(
        &self,
        folder: &str,
        event: &Event,
        replace_uid: Option<&str>,
    ) -> anyhow::Result<()> {
        let folder = folder.to_string();
        let event = event.clone();
        let replace_uid = replace_uid.map(|s| s.to_string());
        self.run(move |session, _| {
            session.select(&folder)?;
            if let Some(uid) = replace_uid {
                let old: Vec<u32> = session
                    .uid_search(format!("HEADER SUBJECT \"{}\"", uid))?
                    .into_iter()
                    .collect();
                if !old.is_empty() {
                    let set = old
                        .iter()
                        .map(|u| u.to_string())
                        .collect::<Vec<_>>()
                        .join(",");
                    session.uid_store(set, "+FLAGS (\\Deleted)")?;
                    session.expunge()?;
                }
            }
            let message = compose_message(&event)?;
            session.append(&folder, &message)?;
            Ok(())
        })
        .await
    }

    async fn delete_object(&self, folder: &str, uid: &str, force: bool) -> anyhow::Result<bool> {
        let (folder, uid) = (folder.to_string(), uid.to_string());
        self.run(move |session, _| {
            session.select(&folder)?;
            let uids: Vec<u32> = session
                .uid_search(format!("HEADER SUBJECT \"{}\" NOT DELETED", uid))?
                .into_iter()
                .collect();
            if uids.is_empty() {
                return Ok(false);
            }
            let set = uids
                .iter()
                .map(|u| u.to_string())
                .collect::<Vec<_>>()
                .join(",");
            session.uid_store(set, "+FLAGS (\\Deleted)")?;
            if force {
                session.expunge()?;
            }
            Ok(true)
        })
        .await
    }

    async fn undelete_object(&self, folder: &str, uid: &str) -> anyhow::Result<bool> {
        let (folder, uid) = (folder.to_string(), uid.to_string());
        self.run(move |session, _| {
            session.select(&folder)?;
            let uids: Vec<u32> = session
                .uid_search(format!("HEADER SUBJECT \"{}\" DELETED", uid))?
                .into_iter()
                .collect();
            if uids.is_empty() {
                return Ok(false);
            }
            let set = uids
                .iter()
                .map(|u| u.to_string())
                .collect::<Vec<_>>()
                .join(",");
            session.uid_store(set, "-FLAGS (\\Deleted)")?;
            Ok(true)
        })
        .await
    }

    fn supports_undelete(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_myrights_response() {
        let response = b"* MYRIGHTS \"Calendar\" lrswipkxte\r\nA1 OK Completed\r\n";
        assert_eq!(parse_myrights(response), Some("lrswipkxte".to_string()));
    }

    #[test]
    fn parses_metadata_response() {
        let response =
            b"* METADATA \"Calendar\" (/shared/vendor/almanac/color \"36c1c0\")\r\nA1 OK\r\n";
        assert_eq!(
            parse_metadata_value(response, "/shared/vendor/almanac/color"),
            Some("36c1c0".to_string())
        );
    }

    #[test]
    fn message_round_trip() {
        use almanac_domain::{CalendarId, Event};
        use chrono::{Duration, TimeZone, Utc};

        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let event = Event::new(
            "feedc0de",
            CalendarId::new("cal"),
            start,
            start + Duration::hours(1),
            start,
        );
        let message = compose_message(&event).unwrap();
        let parsed = parse_message(&message).unwrap();
        assert_eq!(parsed.uid, event.uid);
        assert_eq!(parsed.start, event.start);
    }
}
