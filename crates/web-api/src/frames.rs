//! WebSocket 文本帧
//!
//! 双向都是带 `type` 标签的 JSON 对象。

use application::{ListingDto, MessageDto, OffsetPage, RatingDto};
use domain::{MarketEvent, PresenceState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorBody;

/// 客户端 -> 服务端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Register {
        identity: String,
    },
    Rate {
        id: Uuid,
        rating: i64,
    },
    SendMessage {
        from: String,
        to: String,
        content: String,
    },
    Ping,
}

/// 服务端 -> 客户端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// 连接建立后的第一帧
    Bootstrap {
        items: Vec<ListingDto>,
        next_offset: usize,
    },
    Registered {
        identity: String,
    },
    ListingCreated {
        listing: ListingDto,
    },
    ListingRated {
        id: Uuid,
        rating: RatingDto,
    },
    ListingRemoved {
        id: Uuid,
    },
    MessageSent {
        message: MessageDto,
    },
    PresenceChanged {
        identity: String,
        state: PresenceState,
    },
    Pong,
    /// 只发给出错命令的发起连接
    Error {
        code: String,
        message: String,
    },
}

impl ServerFrame {
    pub fn bootstrap(snapshot: &OffsetPage) -> Self {
        ServerFrame::Bootstrap {
            items: snapshot.items.iter().map(ListingDto::from).collect(),
            next_offset: snapshot.next_offset,
        }
    }

    pub fn error(body: ErrorBody) -> Self {
        ServerFrame::Error {
            code: body.code.to_string(),
            message: body.message,
        }
    }
}

impl From<&MarketEvent> for ServerFrame {
    fn from(event: &MarketEvent) -> Self {
        match event {
            MarketEvent::ListingCreated { listing } => ServerFrame::ListingCreated {
                listing: ListingDto::from(listing),
            },
            MarketEvent::ListingRated { id, rating } => ServerFrame::ListingRated {
                id: Uuid::from(*id),
                rating: RatingDto::from(*rating),
            },
            MarketEvent::ListingRemoved { id } => ServerFrame::ListingRemoved {
                id: Uuid::from(*id),
            },
            MarketEvent::MessageSent { message } => ServerFrame::MessageSent {
                message: MessageDto::from(message),
            },
            MarketEvent::PresenceChanged { identity, state } => ServerFrame::PresenceChanged {
                identity: identity.to_string(),
                state: *state,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Identity, ListingId, RatingAggregate};
    use serde_json::json;

    #[test]
    fn client_commands_use_snake_case_tags() {
        let command: ClientCommand = serde_json::from_value(json!({
            "type": "send_message",
            "from": "bob@0000000002",
            "to": "alice@0000000001",
            "content": "hi",
        }))
        .unwrap();
        assert!(matches!(command, ClientCommand::SendMessage { .. }));

        let ping: ClientCommand = serde_json::from_value(json!({"type": "ping"})).unwrap();
        assert_eq!(ping, ClientCommand::Ping);

        assert!(serde_json::from_value::<ClientCommand>(json!({"type": "delete"})).is_err());
    }

    #[test]
    fn events_become_tagged_frames() {
        let id = ListingId::generate();
        let frame = ServerFrame::from(&MarketEvent::listing_rated(
            id,
            RatingAggregate { count: 2, total: 8 },
        ));
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "listing_rated");
        assert_eq!(json["id"], id.to_string());
        assert_eq!(json["rating"]["average"], 4.0);

        let presence = ServerFrame::from(&MarketEvent::presence_changed(
            Identity::parse("alice@0000000001").unwrap(),
            PresenceState::Online,
        ));
        let json = serde_json::to_value(&presence).unwrap();
        assert_eq!(json["type"], "presence_changed");
        assert_eq!(json["state"], "online");
    }

    #[test]
    fn bootstrap_frame_carries_snapshot_offset() {
        let frame = ServerFrame::bootstrap(&OffsetPage {
            items: Vec::new(),
            next_offset: 0,
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "bootstrap");
        assert_eq!(json["next_offset"], 0);
    }
}
