use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::services::audio::{DeviceUid, SinkIdentity};

fn default_sink_uid() -> String {
    SinkIdentity::default().uid.0
}

fn default_sink_name() -> String {
    SinkIdentity::default().name
}

/// Aggregate sink settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SharingConfig {
    /// Persistent uid of the aggregate sink. Changing it orphans any sink
    /// left behind by a crash under the old uid.
    #[serde(default = "default_sink_uid")]
    pub sink_uid: String,

    /// Name the aggregate sink is shown with in the system output list.
    #[serde(default = "default_sink_name")]
    pub sink_name: String,

    /// When sharing stops, first try the output that was the default
    /// before sharing started.
    #[serde(default)]
    pub restore_previous_default: bool,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            sink_uid: default_sink_uid(),
            sink_name: default_sink_name(),
            restore_previous_default: false,
        }
    }
}

impl SharingConfig {
    /// Sink identity described by this section
    pub fn identity(&self) -> SinkIdentity {
        SinkIdentity {
            uid: DeviceUid::new(self.sink_uid.as_str()),
            name: self.sink_name.clone(),
        }
    }
}
