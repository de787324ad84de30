//! 私信与在线状态存储
//!
//! 会话以无序身份对为键，懒创建、只追加。在线状态条目首次登记后永不删除。

use std::collections::{BTreeMap, BTreeSet, HashMap};

use domain::{
    ConversationKey, DomainResult, Identity, Message, MessageContent, MessageId, PresenceState,
    Timestamp,
};

use crate::clock::MonotonicStamp;

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: HashMap<ConversationKey, Vec<Message>>,
    peers: HashMap<Identity, BTreeSet<Identity>>,
    presence: HashMap<Identity, PresenceState>,
    clock: MonotonicStamp,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 两端都要通过身份校验，正文不能为空；校验全部通过后才写入
    pub fn send(
        &mut self,
        from: &str,
        to: &str,
        content: impl Into<String>,
        now: Timestamp,
    ) -> DomainResult<Message> {
        let from = Identity::parse(from)?;
        let to = Identity::parse(to)?;
        let content = MessageContent::new(content)?;

        let message = Message::new(
            MessageId::generate(),
            from.clone(),
            to.clone(),
            content,
            self.clock.stamp(now),
        );

        self.conversations
            .entry(ConversationKey::new(from.clone(), to.clone()))
            .or_default()
            .push(message.clone());
        self.peers
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        self.peers.entry(to).or_default().insert(from);

        Ok(message)
    }

    /// 对端 -> 按时间排序的消息
    pub fn history(&self, identity: &Identity) -> BTreeMap<Identity, Vec<Message>> {
        let Some(peers) = self.peers.get(identity) else {
            return BTreeMap::new();
        };

        peers
            .iter()
            .filter_map(|peer| {
                let key = ConversationKey::new(identity.clone(), peer.clone());
                self.conversations
                    .get(&key)
                    .map(|messages| (peer.clone(), messages.clone()))
            })
            .collect()
    }

    /// 幂等；只有真实发生状态迁移时返回 `true`。
    ///
    /// 未登记的身份视为离线，首次登记为离线时只建条目、不算迁移。
    pub fn set_presence(&mut self, identity: Identity, state: PresenceState) -> bool {
        let current = self.presence.entry(identity).or_default();
        if *current == state {
            return false;
        }
        *current = state;
        true
    }

    pub fn presence(&self, identity: &Identity) -> PresenceState {
        self.presence.get(identity).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::DomainError;

    const ALICE: &str = "alice@0000000001";
    const BOB: &str = "bob@0000000002";
    const CAROL: &str = "carol@0000000003";

    fn id(value: &str) -> Identity {
        Identity::parse(value).unwrap()
    }

    #[test]
    fn send_validates_both_endpoints_and_content() {
        let mut store = ConversationStore::new();
        assert_eq!(
            store.send("bob", ALICE, "hi", Utc::now()),
            Err(DomainError::invalid_identity("bob"))
        );
        assert_eq!(
            store.send(BOB, "alice@1", "hi", Utc::now()),
            Err(DomainError::invalid_identity("alice@1"))
        );
        assert_eq!(
            store.send(BOB, ALICE, "   ", Utc::now()),
            Err(DomainError::EmptyMessage)
        );
        assert!(store.history(&id(ALICE)).is_empty());
    }

    #[test]
    fn message_is_visible_to_both_participants() {
        let mut store = ConversationStore::new();
        let message = store.send(BOB, ALICE, "hi", Utc::now()).unwrap();
        assert!(message.delivered);

        let alice_view = store.history(&id(ALICE));
        let bob_view = store.history(&id(BOB));
        assert_eq!(alice_view[&id(BOB)], vec![message.clone()]);
        assert_eq!(bob_view[&id(ALICE)], alice_view[&id(BOB)]);
        assert!(store.history(&id(CAROL)).is_empty());
    }

    #[test]
    fn conversations_are_append_only_and_ordered() {
        let mut store = ConversationStore::new();
        let now = Utc::now();
        store.send(ALICE, BOB, "one", now).unwrap();
        store
            .send(BOB, ALICE, "two", now - chrono::Duration::seconds(1))
            .unwrap();
        store.send(ALICE, CAROL, "other", now).unwrap();
        store.send(ALICE, BOB, "three", now).unwrap();

        let bob_view = store.history(&id(BOB));
        let thread = &bob_view[&id(ALICE)];
        let contents: Vec<_> = thread.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert!(thread.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let alice_view = store.history(&id(ALICE));
        assert_eq!(alice_view.len(), 2);
        assert_eq!(alice_view[&id(CAROL)].len(), 1);
    }

    #[test]
    fn self_conversation_appears_once() {
        let mut store = ConversationStore::new();
        store.send(ALICE, ALICE, "note to self", Utc::now()).unwrap();
        let view = store.history(&id(ALICE));
        assert_eq!(view.len(), 1);
        assert_eq!(view[&id(ALICE)].len(), 1);
    }

    #[test]
    fn presence_reports_only_real_transitions() {
        let mut store = ConversationStore::new();
        let alice = id(ALICE);

        assert_eq!(store.presence(&alice), PresenceState::Offline);
        assert!(!store.set_presence(alice.clone(), PresenceState::Offline));

        assert!(store.set_presence(alice.clone(), PresenceState::Online));
        assert!(!store.set_presence(alice.clone(), PresenceState::Online));
        assert!(store.set_presence(alice.clone(), PresenceState::Offline));
        assert!(!store.set_presence(alice.clone(), PresenceState::Offline));
        assert_eq!(store.presence(&alice), PresenceState::Offline);
    }
}
