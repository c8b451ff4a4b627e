//! 远端数据网关 - 通用契约
//!
//! 托管存储（行级 CRUD、对象存储、按表+归属键过滤的变更推送）被抽象为
//! 三个异步 trait；具体厂商的查询语法不进入本 crate。每个调用要么返回
//! 结果，要么返回结构化错误（消息 + 可选错误码）。
//!
//! 行以 JSON 对象传输，通过 serde 映射到 `entities` 中的视图模型。

pub mod memory;

use crate::error::{EduConnectSDKError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

pub use memory::MemoryGateway;

/// 网关行：一个 JSON 对象
pub type Row = serde_json::Map<String, Value>;

/// 订阅句柄
pub type SubscriptionId = u64;

/// 视图模型 -> 行
pub fn to_row<T: Serialize>(value: &T) -> Result<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(EduConnectSDKError::Serialization(format!(
            "expected object row, got: {}",
            other
        ))),
    }
}

/// 行 -> 视图模型
pub fn from_row<T: DeserializeOwned>(row: Row) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// 行过滤器：列等值条件的合取
///
/// 本子系统只需要等值过滤（按归属键、按发布标记）；
/// 更复杂的谓词属于网关厂商，不在契约内。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个列等值条件
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// 行是否满足全部条件（缺失列视为不匹配）
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }
}

/// 变更事件 - 除"某行变了"之外没有载荷契约，消费方必须重新拉取
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub table: String,
}

/// 行级 CRUD
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// 拉取表中满足过滤器的全部行
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>>;

    /// 插入一行，返回落库后的行（含生成的 id）
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// 按过滤器更新（patch 中的列覆盖写）
    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<()>;

    /// 按过滤器删除；没有匹配行时是 no-op
    async fn delete(&self, table: &str, filter: &Filter) -> Result<()>;

    /// 以指定唯一键插入或更新
    async fn upsert(&self, table: &str, row: Row, conflict_key: &[&str]) -> Result<()>;
}

/// 对象存储（公开 URL 读取）
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// 写入对象；`overwrite` 为 false 且键已存在时报错
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, overwrite: bool) -> Result<()>;

    /// 对象的公开访问 URL（同步可得，不校验存在性）
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// 变更推送订阅
///
/// 过滤在服务端生效：只有匹配过滤器的行变更才会投递到接收端。
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(
        &self,
        table: &str,
        filter: Filter,
    ) -> Result<(SubscriptionId, mpsc::Receiver<ChangeEvent>)>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_all_conditions() {
        let filter = Filter::new().eq("user_id", "u-1").eq("is_published", true);
        let mut row = Row::new();
        row.insert("user_id".into(), json!("u-1"));
        row.insert("is_published".into(), json!(true));
        assert!(filter.matches(&row));

        row.insert("is_published".into(), json!(false));
        assert!(!filter.matches(&row));

        // 缺失列视为不匹配
        row.remove("is_published");
        assert!(!filter.matches(&row));
    }

    #[test]
    fn row_mapping_round_trip() {
        use crate::entities::SavedRow;

        let saved = SavedRow {
            id: None,
            user_id: "u-1".into(),
            university_id: "uni-9".into(),
        };
        let row = to_row(&saved).unwrap();
        assert_eq!(row.get("university_id"), Some(&json!("uni-9")));
        let back: SavedRow = from_row(row).unwrap();
        assert_eq!(back.university_id, "uni-9");
    }
}
