//! 在线会话登记表
//!
//! 维护 userId 与当前传输连接的一一对应关系。同一用户重连时新连接
//! 取代旧连接；注销只在连接仍是该用户当前连接时生效，避免旧连接
//! 迟到的断开把新连接踢下线。匿名连接不会进入登记表。

use std::collections::HashMap;

use domain::{SessionId, UserId};
use tokio::sync::RwLock;

#[derive(Default)]
struct RegistryState {
    by_user: HashMap<UserId, SessionId>,
    by_session: HashMap<SessionId, UserId>,
}

/// 进程内的在线用户登记表。
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将用户绑定到连接，返回被取代的旧连接。
    pub async fn register(&self, user_id: UserId, session_id: SessionId) -> Option<SessionId> {
        let mut state = self.inner.write().await;
        let superseded = state.by_user.insert(user_id, session_id);
        if let Some(old) = superseded {
            state.by_session.remove(&old);
        }
        state.by_session.insert(session_id, user_id);
        superseded.filter(|old| *old != session_id)
    }

    /// 解除连接的绑定。只有当该连接仍是用户的当前连接时才会移除，
    /// 返回被解绑的用户。
    pub async fn unregister(&self, session_id: SessionId) -> Option<UserId> {
        let mut state = self.inner.write().await;
        let user_id = state.by_session.remove(&session_id)?;
        if state.by_user.get(&user_id) == Some(&session_id) {
            state.by_user.remove(&user_id);
        }
        Some(user_id)
    }

    /// 查询用户当前的连接。
    pub async fn lookup(&self, user_id: UserId) -> Option<SessionId> {
        self.inner.read().await.by_user.get(&user_id).copied()
    }

    /// 查询连接绑定的用户。
    pub async fn session_user(&self, session_id: SessionId) -> Option<UserId> {
        self.inner.read().await.by_session.get(&session_id).copied()
    }

    /// 当前在线用户列表，按标识升序。
    pub async fn list_active(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.inner.read().await.by_user.keys().copied().collect();
        users.sort();
        users
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn user(n: u128) -> UserId {
        UserId::new(Uuid::from_u128(n))
    }

    fn session(n: u128) -> SessionId {
        SessionId::new(Uuid::from_u128(n))
    }

    #[tokio::test]
    async fn reconnect_supersedes_previous_session() {
        let registry = SessionRegistry::new();
        let alice = user(1);

        assert_eq!(registry.register(alice, session(10)).await, None);
        assert_eq!(registry.register(alice, session(11)).await, Some(session(10)));

        assert_eq!(registry.lookup(alice).await, Some(session(11)));
        assert_eq!(registry.list_active().await, vec![alice]);
    }

    #[tokio::test]
    async fn stale_unregister_keeps_new_binding() {
        let registry = SessionRegistry::new();
        let alice = user(1);

        registry.register(alice, session(10)).await;
        registry.register(alice, session(11)).await;

        // 旧连接迟到的断开不影响新绑定
        assert_eq!(registry.unregister(session(10)).await, None);
        assert_eq!(registry.lookup(alice).await, Some(session(11)));

        assert_eq!(registry.unregister(session(11)).await, Some(alice));
        assert_eq!(registry.lookup(alice).await, None);
    }

    #[tokio::test]
    async fn list_active_is_sorted() {
        let registry = SessionRegistry::new();
        let low = user(1);
        let high = user(2);

        registry.register(high, session(20)).await;
        registry.register(low, session(10)).await;

        assert_eq!(registry.list_active().await, vec![low, high]);
    }

    #[tokio::test]
    async fn session_user_follows_binding() {
        let registry = SessionRegistry::new();
        let alice = user(1);

        registry.register(alice, session(10)).await;
        assert_eq!(registry.session_user(session(10)).await, Some(alice));

        registry.register(alice, session(11)).await;
        assert_eq!(registry.session_user(session(10)).await, None);
        assert_eq!(registry.session_user(session(11)).await, Some(alice));
    }
}
