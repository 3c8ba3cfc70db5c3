use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaste {
    pub data: String,
    pub language_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedPaste {
    pub id: String,
    pub url: String,
}

/// Response to a raw document upload.
#[derive(Debug, Serialize)]
pub struct UploadedDocument {
    pub key: String,
}
