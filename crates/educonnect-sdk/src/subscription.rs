//! 变更订阅管理器
//!
//! 每个会话对角色相关的表各开一条订阅，过滤器按归属键限定在服务端；
//! 事件没有载荷，收到后一律按表名映射到加载器整体重拉。
//! 生命周期与会话对齐：启动时建立，关闭时全部退订，不允许跨会话泄漏。

use crate::gateway::{ChangeFeed, Filter, SubscriptionId};
use crate::loaders::{EntityLoaders, LoaderKind};
use crate::session::{UserRole, UserSession};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 订阅生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Active,
}

struct ActiveSubscription {
    id: SubscriptionId,
    table: String,
    pump: JoinHandle<()>,
}

/// 变更订阅管理器
pub struct ChangeSubscriptionManager {
    feed: Arc<dyn ChangeFeed>,
    loaders: Arc<EntityLoaders>,
    state: RwLock<SubscriptionState>,
    active: Mutex<Vec<ActiveSubscription>>,
}

/// 角色相关的监听表集合（表名 + 归属过滤器）
fn watched_tables(session: &UserSession) -> Vec<(&'static str, Filter)> {
    use crate::entities::tables;

    match session.role {
        UserRole::Student => vec![
            (
                tables::STUDENT_SAVED_UNIVERSITIES,
                Filter::new().eq("user_id", session.user_id.clone()),
            ),
            (
                tables::STUDENT_APPLICATIONS,
                Filter::new().eq("user_id", session.user_id.clone()),
            ),
        ],
        UserRole::University => vec![
            (
                tables::UNIVERSITY_PROFILES,
                Filter::new().eq("id", session.user_id.clone()),
            ),
            (
                tables::UNIVERSITY_PROGRAMS,
                Filter::new().eq("university_id", session.user_id.clone()),
            ),
        ],
    }
}

impl ChangeSubscriptionManager {
    pub fn new(feed: Arc<dyn ChangeFeed>, loaders: Arc<EntityLoaders>) -> Self {
        Self {
            feed,
            loaders,
            state: RwLock::new(SubscriptionState::Unsubscribed),
            active: Mutex::new(Vec::new()),
        }
    }

    pub async fn state(&self) -> SubscriptionState {
        *self.state.read().await
    }

    /// 当前活跃订阅数
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// 建立全部订阅并启动事件泵
    ///
    /// 重复调用是 no-op；部分订阅失败时已建立的订阅保留，
    /// 失败的表只记日志（该表的远端变更在本会话内不再可见）。
    pub async fn start(&self) {
        {
            let mut state = self.state.write().await;
            if *state != SubscriptionState::Unsubscribed {
                warn!("subscription manager already started, ignoring");
                return;
            }
            *state = SubscriptionState::Subscribing;
        }

        let session = self.loaders.session().clone();
        let role = session.role;
        let mut active = self.active.lock().await;
        for (table, filter) in watched_tables(&session) {
            match self.feed.subscribe(table, filter).await {
                Ok((id, mut receiver)) => {
                    let loaders = self.loaders.clone();
                    let pump = tokio::spawn(async move {
                        while let Some(event) = receiver.recv().await {
                            debug!("change event on table: {}", event.table);
                            let Some(kind) = LoaderKind::for_table(&event.table, role) else {
                                continue;
                            };
                            if let Err(e) = loaders.reload(kind).await {
                                warn!("reload {} after change event failed: {}", kind, e);
                            }
                        }
                    });
                    active.push(ActiveSubscription {
                        id,
                        table: table.to_string(),
                        pump,
                    });
                }
                Err(e) => {
                    warn!("subscribe to {} failed: {}", table, e);
                }
            }
        }
        info!("change subscriptions active: {}", active.len());
        drop(active);

        *self.state.write().await = SubscriptionState::Active;
    }

    /// 退订全部并停掉事件泵；可重复调用
    pub async fn shutdown(&self) {
        let mut active = self.active.lock().await;
        for subscription in active.drain(..) {
            if let Err(e) = self.feed.unsubscribe(subscription.id).await {
                warn!("unsubscribe from {} failed: {}", subscription.table, e);
            }
            subscription.pump.abort();
        }
        drop(active);

        let mut state = self.state.write().await;
        if *state != SubscriptionState::Unsubscribed {
            info!("change subscriptions shut down");
            *state = SubscriptionState::Unsubscribed;
        }
    }
}

impl Drop for ChangeSubscriptionManager {
    fn drop(&mut self) {
        if let Ok(active) = self.active.try_lock() {
            if !active.is_empty() {
                warn!(
                    "subscription manager dropped with {} active subscriptions",
                    active.len()
                );
            }
        }
    }
}
