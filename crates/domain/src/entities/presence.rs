use serde::{Deserialize, Serialize};

/// 在线状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Online,
    #[default]
    Offline,
}

impl PresenceState {
    pub fn is_online(self) -> bool {
        matches!(self, PresenceState::Online)
    }
}
