//! EduConnect SDK - 仪表盘数据同步层
//!
//! 面向教育匹配平台的会话作用域客户端同步层，包括：
//! - 📦 实体加载器：按会话身份整体拉取并替换切片
//! - ✍️ 变更处理器：用户动作的终端错误边界，失败转用户通知
//! - 📡 变更订阅：按归属键过滤的无载荷事件，收到即整体重拉
//! - 🗂️ 视图状态仓库：UI 渲染的唯一数据源 + 档案完整度派生
//! - 🔌 网关契约：行存储 / 对象存储 / 变更推送三个可注入的异步 trait
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use educonnect_sdk::{DocumentType, EduConnectSDK, UserSession};
//! use educonnect_sdk::gateway::MemoryGateway;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     // 注入网关实现（内存网关同时实现三个契约）
//!     let gateway = Arc::new(MemoryGateway::with_educonnect_schema());
//!     let session = UserSession::student("user-1", "user@example.com");
//!     let sdk = EduConnectSDK::new(session, gateway.clone(), gateway.clone(), gateway);
//!
//!     // 冷加载全部切片 + 建立变更订阅
//!     sdk.start().await;
//!
//!     // 用户动作：结果以通知形式浮出，绝不向调用方抛错
//!     let mut notifications = sdk.notifications().subscribe();
//!     sdk.mutations()
//!         .upload_document(DocumentType::IeltsScore, "ielts.pdf", vec![0u8; 16])
//!         .await;
//!     println!("{}", notifications.recv().await.unwrap().title);
//!
//!     // 档案完整度（0-100）
//!     println!("completeness: {}", sdk.store().profile_completeness().await);
//!
//!     // 会话结束：退订全部变更推送
//!     sdk.shutdown().await;
//! }
//! ```

// 导出核心模块
pub mod entities;
pub mod error;
pub mod gateway;
pub mod loaders;
pub mod mutations;
pub mod notify;
pub mod sdk;
pub mod session;
pub mod store;
pub mod subscription;
pub mod version;

// 重新导出核心类型，方便使用
pub use entities::{
    Application, CatalogEntry, DocumentRecord, DocumentStatus, DocumentType, NewProgram, Program,
    SavedRow, StudentProfile, UniversityProfile, REQUIRED_PROFILE_FIELDS,
};
pub use error::{EduConnectSDKError, Result};
pub use gateway::{
    BlobStore, ChangeEvent, ChangeFeed, DataGateway, Filter, MemoryGateway, Row, SubscriptionId,
};
pub use loaders::{EntityLoaders, LoaderKind};
pub use mutations::MutationHandlers;
pub use notify::{Notification, NotificationCenter, NotificationLevel};
pub use sdk::{EduConnectSDK, SyncConfig};
pub use session::{UserRole, UserSession};
pub use store::{FilterState, ViewStateStore};
pub use subscription::{ChangeSubscriptionManager, SubscriptionState};
pub use version::SDK_VERSION;

/// 测试日志初始化：输出接到测试捕获器，重复调用是 no-op
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
