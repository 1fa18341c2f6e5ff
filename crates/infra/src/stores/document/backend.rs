use almanac_domain::Event;

/// A folder visible on the document server, before any calendar semantics
/// are layered on top.
#[derive(Clone, Debug)]
pub struct FolderInfo {
    /// Full folder path, e.g. `Calendar/Work`.
    pub name: String,
    /// Login name of the folder owner.
    pub owner: String,
    /// IMAP-style rights string of the current user on this folder.
    pub rights: String,
    pub subscribed: bool,
}

impl FolderInfo {
    /// Writable when the user owns the folder or holds the insert right.
    pub fn writable_by(&self, username: &str) -> bool {
        self.owner == username || self.rights.contains('i')
    }
}

/// Folder-scoped object storage collaborator: one document per event, keyed
/// by UID, plus key/value metadata per folder. The production implementation
/// speaks IMAP; tests use the in-memory one.
///
/// Deletes are soft by default where the backend supports it (`force` makes
/// them permanent); `undelete_object` reverses a soft delete.
#[async_trait::async_trait]
pub trait FolderBackend: Send + Sync {
    async fn list_folders(&self) -> anyhow::Result<Vec<FolderInfo>>;
    async fn create_folder(&self, name: &str) -> anyhow::Result<()>;
    async fn rename_folder(&self, old: &str, new: &str) -> anyhow::Result<()>;
    async fn delete_folder(&self, name: &str) -> anyhow::Result<()>;
    async fn set_subscribed(&self, name: &str, subscribed: bool) -> anyhow::Result<()>;

    async fn get_metadata(&self, folder: &str, key: &str) -> anyhow::Result<Option<String>>;
    async fn set_metadata(&self, folder: &str, key: &str, value: &str) -> anyhow::Result<()>;

    /// All non-deleted event documents in the folder.
    async fn list_objects(&self, folder: &str) -> anyhow::Result<Vec<Event>>;
    /// Direct lookup through the backend's UID-bearing header search.
    async fn find_object(&self, folder: &str, uid: &str) -> anyhow::Result<Option<Event>>;
    /// Stores a document; `replace_uid` removes the previous revision of
    /// that uid in the same operation.
    async fn save_object(
        &self,
        folder: &str,
        event: &Event,
        replace_uid: Option<&str>,
    ) -> anyhow::Result<()>;
    async fn delete_object(&self, folder: &str, uid: &str, force: bool) -> anyhow::Result<bool>;
    async fn undelete_object(&self, folder: &str, uid: &str) -> anyhow::Result<bool>;

    fn supports_undelete(&self) -> bool;
}
