use super::backend::{FolderBackend, FolderInfo};
use almanac_domain::Event;
use std::collections::HashMap;
use std::sync::Mutex;

struct StoredObject {
    event: Event,
    deleted: bool,
}

struct FolderData {
    info: FolderInfo,
    metadata: HashMap<String, String>,
    objects: Vec<StoredObject>,
}

/// In-memory `FolderBackend` with the same soft-delete semantics as the
/// IMAP one. Used by tests and local development.
pub struct InMemoryFolderBackend {
    owner: String,
    folders: Mutex<HashMap<String, FolderData>>,
}

impl InMemoryFolderBackend {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            folders: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl FolderBackend for InMemoryFolderBackend {
    async fn list_folders(&self) -> anyhow::Result<Vec<FolderInfo>> {
        let folders = self.folders.lock().unwrap();
        let mut infos: Vec<FolderInfo> = folders.values().map(|f| f.info.clone()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    async fn create_folder(&self, name: &str) -> anyhow::Result<()> {
        let mut folders = self.folders.lock().unwrap();
        if folders.contains_key(name) {
            anyhow::bail!("folder exists: {}", name);
        }
        folders.insert(
            name.to_string(),
            FolderData {
                info: FolderInfo {
                    name: name.to_string(),
                    owner: self.owner.clone(),
                    rights: "lrswi".into(),
                    subscribed: true,
                },
                metadata: HashMap::new(),
                objects: Vec::new(),
            },
        );
        Ok(())
    }

    async fn rename_folder(&self, old: &str, new: &str) -> anyhow::Result<()> {
        let mut folders = self.folders.lock().unwrap();
        let mut data = folders
            .remove(old)
            .ok_or_else(|| anyhow::anyhow!("no such folder: {}", old))?;
        data.info.name = new.to_string();
        folders.insert(new.to_string(), data);
        Ok(())
    }

    async fn delete_folder(&self, name: &str) -> anyhow::Result<()> {
        let mut folders = self.folders.lock().unwrap();
        folders
            .remove(name)
            .ok_or_else(|| anyhow::anyhow!("no such folder: {}", name))?;
        Ok(())
    }

    async fn set_subscribed(&self, name: &str, subscribed: bool) -> anyhow::Result<()> {
        let mut folders = self.folders.lock().unwrap();
        let data = folders
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("no such folder: {}", name))?;
        data.info.subscribed = subscribed;
        Ok(())
    }

    async fn get_metadata(&self, folder: &str, key: &str) -> anyhow::Result<Option<String>> {
        let folders = self.folders.lock().unwrap();
        Ok(folders
            .get(folder)
            .and_then(|f| f.metadata.get(key).cloned()))
    }

    async fn set_metadata(&self, folder: &str, key: &str, value: &str) -> anyhow::Result<()> {
        let mut folders = self.folders.lock().unwrap();
        let data = folders
            .get_mut(folder)
            .ok_or_else(|| anyhow::anyhow!("no such folder: {}", folder))?;
        data.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn list_objects(&self, folder: &str) -> anyhow::Result<Vec<Event>> {
        let folders = self.folders.lock().unwrap();
        Ok(folders
            .get(folder)
            .map(|f| {
                f.objects
                    .iter()
                    .filter(|o| !o.deleted)
                    .map(|o| o.event.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_object(&self, folder: &str, uid: &str) -> anyhow::Result<Option<Event>> {
        let folders = self.folders.lock().unwrap();
        Ok(folders.get(folder).and_then(|f| {
            f.objects
                .iter()
                .find(|o| !o.deleted && o.event.uid == uid)
                .map(|o| o.event.clone())
        }))
    }

    async fn save_object(
        &self,
        folder: &str,
        event: &Event,
        replace_uid: Option<&str>,
    ) -> anyhow::Result<()> {
        let mut folders = self.folders.lock().unwrap();
        let data = folders
            .get_mut(folder)
            .ok_or_else(|| anyhow::anyhow!("no such folder: {}", folder))?;
        if let Some(uid) = replace_uid {
            data.objects.retain(|o| o.event.uid != uid);
        }
        data.objects.push(StoredObject {
            event: event.clone(),
            deleted: false,
        });
        Ok(())
    }

    async fn delete_object(&self, folder: &str, uid: &str, force: bool) -> anyhow::Result<bool> {
        let mut folders = self.folders.lock().unwrap();
        let data = match folders.get_mut(folder) {
            Some(data) => data,
            None => return Ok(false),
        };
        if force {
            let before = data.objects.len();
            data.objects.retain(|o| o.event.uid != uid);
            return Ok(data.objects.len() < before);
        }
        match data
            .objects
            .iter_mut()
            .find(|o| !o.deleted && o.event.uid == uid)
        {
            Some(object) => {
                object.deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn undelete_object(&self, folder: &str, uid: &str) -> anyhow::Result<bool> {
        let mut folders = self.folders.lock().unwrap();
        let data = match folders.get_mut(folder) {
            Some(data) => data,
            None => return Ok(false),
        };
        match data
            .objects
            .iter_mut()
            .find(|o| o.deleted && o.event.uid == uid)
        {
            Some(object) => {
                object.deleted = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn supports_undelete(&self) -> bool {
        true
    }
}
