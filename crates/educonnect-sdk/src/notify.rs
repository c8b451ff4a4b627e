//! 用户通知通道
//!
//! 变更处理器通过这里上报成败；呈现方式（toast 等）由宿主决定。
//! 广播语义：没有订阅者时发送失败属正常场景（压测/无 UI），仅打 debug。

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// 一条用户可见通知
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub body: Option<String>,
}

impl Notification {
    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            title: title.into(),
            body: Some(body.into()),
        }
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            title: title.into(),
            body: Some(body.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

/// 通知中心
pub struct NotificationCenter {
    sender: broadcast::Sender<Notification>,
}

impl NotificationCenter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// 发布一条通知
    pub fn emit(&self, notification: Notification) {
        debug!(
            "notification [{:?}] {}",
            notification.level, notification.title
        );
        if let Err(e) = self.sender.send(notification) {
            debug!("notification dropped (no active receivers): {}", e);
        }
    }

    /// 订阅通知流
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_notifications() {
        let center = NotificationCenter::new(16);
        let mut receiver = center.subscribe();

        center.emit(Notification::success("Document uploaded", "IELTS Score"));
        let notification = receiver.recv().await.unwrap();
        assert_eq!(notification.level, NotificationLevel::Success);
        assert_eq!(notification.title, "Document uploaded");

        center.emit(Notification::error("Upload failed", "timeout"));
        assert!(receiver.recv().await.unwrap().is_error());
    }

    #[test]
    fn emit_without_receivers_is_not_an_error() {
        let center = NotificationCenter::new(4);
        center.emit(Notification::success("ok", "no ui attached"));
    }
}
