//! 会话注册表
//!
//! 每个连接的状态机：`Anonymous -> Identified -> Closed`。
//! 同一身份可以同时有多个连接（例如两个标签页），只有最后一个连接
//! 离开时该身份才会下线。

use std::collections::HashMap;

use domain::{ConnectionId, DomainError, DomainResult, Identity, PresenceState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    Identified(Identity),
    Closed,
}

/// 由注册表计算、交给会话存储落地的在线状态迁移
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceTransition {
    pub identity: Identity,
    pub state: PresenceState,
}

impl PresenceTransition {
    fn online(identity: Identity) -> Self {
        Self {
            identity,
            state: PresenceState::Online,
        }
    }

    fn offline(identity: Identity) -> Self {
        Self {
            identity,
            state: PresenceState::Offline,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// 关闭的连接直接移除
    sessions: HashMap<ConnectionId, Option<Identity>>,
    holders: HashMap<Identity, usize>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 传输层建立连接，初始为匿名
    pub fn open(&mut self) -> ConnectionId {
        let mut connection_id = ConnectionId::generate();
        while self.sessions.contains_key(&connection_id) {
            connection_id = ConnectionId::generate();
        }
        self.sessions.insert(connection_id, None);
        connection_id
    }

    /// 绑定或换绑身份。非法身份被拒绝，连接保持原状态。
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        identity: &str,
    ) -> DomainResult<Vec<PresenceTransition>> {
        let identity = Identity::parse(identity)?;
        let bound = self
            .sessions
            .get_mut(&connection_id)
            .ok_or(DomainError::SessionClosed)?;

        if bound.as_ref() == Some(&identity) {
            return Ok(Vec::new());
        }

        let previous = bound.replace(identity.clone());
        let mut transitions = Vec::with_capacity(2);

        if let Some(previous) = previous {
            if self.release(&previous) {
                transitions.push(PresenceTransition::offline(previous));
            }
        }

        let holders = self.holders.entry(identity.clone()).or_insert(0);
        *holders += 1;
        if *holders == 1 {
            transitions.push(PresenceTransition::online(identity));
        }

        Ok(transitions)
    }

    /// 进入终态。重复关闭是空操作。
    pub fn close(&mut self, connection_id: ConnectionId) -> Vec<PresenceTransition> {
        match self.sessions.remove(&connection_id) {
            Some(Some(identity)) if self.release(&identity) => {
                vec![PresenceTransition::offline(identity)]
            }
            _ => Vec::new(),
        }
    }

    pub fn state(&self, connection_id: ConnectionId) -> SessionState {
        match self.sessions.get(&connection_id) {
            None => SessionState::Closed,
            Some(None) => SessionState::Anonymous,
            Some(Some(identity)) => SessionState::Identified(identity.clone()),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions_for(&self, identity: &Identity) -> usize {
        self.holders.get(identity).copied().unwrap_or(0)
    }

    /// 释放一个持有者；返回该身份是否已无任何连接
    fn release(&mut self, identity: &Identity) -> bool {
        match self.holders.get_mut(identity) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.holders.remove(identity);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "alice@0000000001";
    const BOB: &str = "bob@0000000002";

    fn id(value: &str) -> Identity {
        Identity::parse(value).unwrap()
    }

    #[test]
    fn open_is_anonymous_and_close_is_terminal() {
        let mut registry = SessionRegistry::new();
        let conn = registry.open();
        assert_eq!(registry.state(conn), SessionState::Anonymous);

        assert!(registry.close(conn).is_empty());
        assert_eq!(registry.state(conn), SessionState::Closed);
        assert_eq!(
            registry.register(conn, ALICE),
            Err(DomainError::SessionClosed)
        );
        assert!(registry.close(conn).is_empty());
    }

    #[test]
    fn invalid_identity_keeps_previous_state() {
        let mut registry = SessionRegistry::new();
        let conn = registry.open();
        assert!(matches!(
            registry.register(conn, "alice"),
            Err(DomainError::InvalidIdentity { .. })
        ));
        assert_eq!(registry.state(conn), SessionState::Anonymous);

        registry.register(conn, ALICE).unwrap();
        assert!(registry.register(conn, "nope").is_err());
        assert_eq!(registry.state(conn), SessionState::Identified(id(ALICE)));
    }

    #[test]
    fn register_brings_identity_online_once() {
        let mut registry = SessionRegistry::new();
        let conn = registry.open();
        assert_eq!(
            registry.register(conn, ALICE).unwrap(),
            vec![PresenceTransition::online(id(ALICE))]
        );
        assert!(registry.register(conn, ALICE).unwrap().is_empty());
        assert_eq!(registry.sessions_for(&id(ALICE)), 1);
    }

    #[test]
    fn two_tabs_go_offline_only_when_both_close() {
        let mut registry = SessionRegistry::new();
        let first = registry.open();
        let second = registry.open();

        assert_eq!(registry.register(first, ALICE).unwrap().len(), 1);
        assert!(registry.register(second, ALICE).unwrap().is_empty());
        assert_eq!(registry.sessions_for(&id(ALICE)), 2);

        assert!(registry.close(first).is_empty());
        assert_eq!(
            registry.close(second),
            vec![PresenceTransition::offline(id(ALICE))]
        );
        assert!(registry.close(second).is_empty());
        assert_eq!(registry.active_sessions(), 0);
    }

    #[test]
    fn rebind_moves_presence_between_identities() {
        let mut registry = SessionRegistry::new();
        let conn = registry.open();
        registry.register(conn, ALICE).unwrap();

        assert_eq!(
            registry.register(conn, BOB).unwrap(),
            vec![
                PresenceTransition::offline(id(ALICE)),
                PresenceTransition::online(id(BOB)),
            ]
        );
        assert_eq!(registry.state(conn), SessionState::Identified(id(BOB)));
    }

    #[test]
    fn rebind_keeps_identity_online_while_another_tab_holds_it() {
        let mut registry = SessionRegistry::new();
        let tab = registry.open();
        let other_tab = registry.open();
        registry.register(tab, ALICE).unwrap();
        registry.register(other_tab, ALICE).unwrap();

        assert_eq!(
            registry.register(tab, BOB).unwrap(),
            vec![PresenceTransition::online(id(BOB))]
        );
        assert_eq!(registry.sessions_for(&id(ALICE)), 1);
    }
}
