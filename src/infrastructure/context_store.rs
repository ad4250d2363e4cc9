//! 用户上下文存储
//!
//! 按客户端提供的 userId 保存最近一次上下文，仅存在于进程生命周期内

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::shared::UserContext;

#[derive(Debug, Default)]
pub struct UserContextStore {
    contexts: RwLock<HashMap<String, UserContext>>,
}

pub type SharedUserContextStore = Arc<UserContextStore>;

impl UserContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn save(&self, user_id: impl Into<String>, context: UserContext) {
        let user_id = user_id.into();
        debug!("保存用户上下文: user_id={}", user_id);
        self.contexts.write().await.insert(user_id, context);
    }

    pub async fn get(&self, user_id: &str) -> Option<UserContext> {
        self.contexts.read().await.get(user_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_overwrites_previous_context() {
        let store = UserContextStore::new();
        assert!(store.get("u1").await.is_none());

        store.save("u1", UserContext { streak: 1, ..Default::default() }).await;
        store.save("u1", UserContext { streak: 2, ..Default::default() }).await;

        assert_eq!(store.get("u1").await.map(|c| c.streak), Some(2));
        assert_eq!(store.len().await, 1);
    }
}
