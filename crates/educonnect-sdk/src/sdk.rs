//! SDK 门面
//!
//! 把加载器、变更处理器、订阅管理器、通知中心组装在一个会话作用域的
//! 对象里。宿主注入三个网关实现（行存储、对象存储、变更推送）和会话
//! 身份，之后只跟门面打交道：
//!
//! - `start()`：并行冷加载全部角色相关切片，然后建立变更订阅
//! - `mutations()`：用户动作入口，失败以通知形式浮出
//! - `store()`：UI 渲染用的切片快照
//! - `shutdown()`：退订全部变更推送，会话结束时必须调用

use crate::gateway::{BlobStore, ChangeFeed, DataGateway};
use crate::loaders::EntityLoaders;
use crate::mutations::MutationHandlers;
use crate::notify::NotificationCenter;
use crate::session::UserSession;
use crate::store::ViewStateStore;
use crate::subscription::ChangeSubscriptionManager;
use std::sync::Arc;
use tracing::info;

/// 同步层配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 通知广播通道容量
    pub notification_buffer_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            notification_buffer_size: 64,
        }
    }
}

/// 会话作用域的同步层门面
pub struct EduConnectSDK {
    session: UserSession,
    store: Arc<ViewStateStore>,
    loaders: Arc<EntityLoaders>,
    mutations: Arc<MutationHandlers>,
    subscriptions: ChangeSubscriptionManager,
    notifications: Arc<NotificationCenter>,
}

impl EduConnectSDK {
    /// 用默认配置组装
    pub fn new(
        session: UserSession,
        gateway: Arc<dyn DataGateway>,
        blobs: Arc<dyn BlobStore>,
        feed: Arc<dyn ChangeFeed>,
    ) -> Self {
        Self::with_config(session, gateway, blobs, feed, SyncConfig::default())
    }

    pub fn with_config(
        session: UserSession,
        gateway: Arc<dyn DataGateway>,
        blobs: Arc<dyn BlobStore>,
        feed: Arc<dyn ChangeFeed>,
        config: SyncConfig,
    ) -> Self {
        let store = Arc::new(ViewStateStore::new());
        let notifications = Arc::new(NotificationCenter::new(config.notification_buffer_size));
        let loaders = Arc::new(EntityLoaders::new(
            gateway.clone(),
            store.clone(),
            session.clone(),
        ));
        let mutations = Arc::new(MutationHandlers::new(
            gateway,
            blobs,
            store.clone(),
            loaders.clone(),
            notifications.clone(),
            session.clone(),
        ));
        let subscriptions = ChangeSubscriptionManager::new(feed, loaders.clone());

        Self {
            session,
            store,
            loaders,
            mutations,
            subscriptions,
            notifications,
        }
    }

    /// 冷加载全部切片，然后建立变更订阅
    pub async fn start(&self) {
        info!(
            "starting sync for {} session: {}",
            self.session.role, self.session.user_id
        );
        self.loaders.load_all().await;
        self.subscriptions.start().await;
    }

    /// 退订全部变更推送；可重复调用
    pub async fn shutdown(&self) {
        info!("shutting down sync for session: {}", self.session.user_id);
        self.subscriptions.shutdown().await;
    }

    pub fn session(&self) -> &UserSession {
        &self.session
    }

    pub fn store(&self) -> &Arc<ViewStateStore> {
        &self.store
    }

    pub fn loaders(&self) -> &Arc<EntityLoaders> {
        &self.loaders
    }

    pub fn mutations(&self) -> &Arc<MutationHandlers> {
        &self.mutations
    }

    pub fn subscriptions(&self) -> &ChangeSubscriptionManager {
        &self.subscriptions
    }

    pub fn notifications(&self) -> &Arc<NotificationCenter> {
        &self.notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{tables, DocumentStatus, DocumentType};
    use crate::gateway::MemoryGateway;

    fn sdk_over_memory(session: UserSession) -> (EduConnectSDK, Arc<MemoryGateway>) {
        crate::init_test_logging();
        let gateway = Arc::new(MemoryGateway::with_educonnect_schema());
        let sdk = EduConnectSDK::new(
            session,
            gateway.clone(),
            gateway.clone(),
            gateway.clone(),
        );
        (sdk, gateway)
    }

    #[tokio::test]
    async fn start_loads_slices_and_opens_subscriptions() {
        let (sdk, gateway) = sdk_over_memory(UserSession::student("s-1", "s1@example.com"));
        assert!(sdk.store().is_loading().await);

        sdk.start().await;

        assert!(!sdk.store().is_loading().await);
        assert_eq!(sdk.store().documents().await.len(), DocumentType::ALL.len());
        assert_eq!(gateway.open_subscriptions().await, 2);

        sdk.shutdown().await;
        assert_eq!(gateway.open_subscriptions().await, 0);
    }

    #[tokio::test]
    async fn mutation_flows_through_facade() {
        let (sdk, gateway) = sdk_over_memory(UserSession::student("s-1", "s1@example.com"));
        sdk.start().await;

        sdk.mutations()
            .upload_document(DocumentType::CvResume, "cv.pdf", vec![1, 2, 3])
            .await;

        assert_eq!(gateway.row_count(tables::STUDENT_DOCUMENTS).await, 1);
        let documents = sdk.store().documents().await;
        let record = documents
            .iter()
            .find(|d| d.doc_type == DocumentType::CvResume)
            .unwrap();
        assert_eq!(record.status, DocumentStatus::Uploaded);

        sdk.shutdown().await;
    }

    #[tokio::test]
    async fn university_session_bootstraps_profile_on_start() {
        let (sdk, gateway) = sdk_over_memory(UserSession::university("u-1", "cms@example.edu"));
        sdk.start().await;

        // 懒创建：首启后档案行存在且未发布
        assert_eq!(gateway.row_count(tables::UNIVERSITY_PROFILES).await, 1);
        let profile = sdk.store().university_profile().await.unwrap();
        assert!(!profile.is_published);

        sdk.shutdown().await;
    }
}
