use serde::{Deserialize, Serialize};

/// Opaque file attached to an event. The relational backend stores the body
/// in its own table; the document backend embeds it in the event document,
/// addressed by a content id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub mimetype: String,
    pub size: i64,
    /// Body bytes; present on upload and on document-backend reads, absent
    /// in listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl Attachment {
    pub fn metadata_only(&self) -> Self {
        Self {
            data: None,
            ..self.clone()
        }
    }
}
