use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::store::file_store::FileStoreConfig;

/// A wrapper for the session store configuration:
/// - enabled: if false, sessions only live in memory for the lifetime of the process.
/// - backend: the actual store backend (memory, file).
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct SessionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub backend: Option<SessionBackend>,
}

/// The existing session backends. We differentiate them via a "type" tag in the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum SessionBackend {
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "file")]
    File(FileStoreConfig),
}
