use serde::{Deserialize, Serialize};

use crate::value_objects::{Identity, MessageContent, MessageId, Timestamp};

/// 两个身份之间的私信，创建后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub from: Identity,
    pub to: Identity,
    pub content: MessageContent,
    pub timestamp: Timestamp,
    /// 没有确认协议，接收即视为已送达
    pub delivered: bool,
}

impl Message {
    pub fn new(
        id: MessageId,
        from: Identity,
        to: Identity,
        content: MessageContent,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            from,
            to,
            content,
            timestamp,
            delivered: true,
        }
    }

    /// 对 `participant` 而言的对端。自己给自己发的消息对端就是自己。
    pub fn peer_of(&self, participant: &Identity) -> &Identity {
        if &self.from == participant {
            &self.to
        } else {
            &self.from
        }
    }
}

/// 无序身份对，作为会话的键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey(Identity, Identity);

impl ConversationKey {
    pub fn new(a: Identity, b: Identity) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn participants(&self) -> (&Identity, &Identity) {
        (&self.0, &self.1)
    }
}
