use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Binary side-payload submitted alongside an event (minidumps, log files, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub content_type: Option<String>,
    /// e.g. `event.attachment`, `event.minidump`
    #[serde(default = "default_attachment_type")]
    pub attachment_type: String,
    #[serde(serialize_with = "encode_data", deserialize_with = "decode_data")]
    pub data: Vec<u8>,
}

fn default_attachment_type() -> String {
    "event.attachment".to_string()
}

impl Attachment {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            attachment_type: default_attachment_type(),
            data,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_attachment_type(mut self, attachment_type: impl Into<String>) -> Self {
        self.attachment_type = attachment_type.into();
        self
    }
}

fn encode_data<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&STANDARD.encode(data))
}

fn decode_data<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    STANDARD
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}
