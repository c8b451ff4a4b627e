//! 内存网关 - 三个网关 trait 的进程内实现
//!
//! 用途：
//! - 单元/集成测试的测试替身（含打开订阅句柄计数，用于资源泄漏校验）
//! - 宿主应用的演示模式（无后端可用时）
//!
//! 行为与托管存储对齐：
//! - 插入自动生成 uuid 行 id
//! - 注册的唯一约束在 insert 时生效，冲突返回 Conflict（码 23505）
//! - upsert 按冲突键替换既有行，保留原 id
//! - 变更事件只投递给过滤器匹配变更行的订阅者（服务端过滤语义）

use super::{BlobStore, ChangeEvent, ChangeFeed, DataGateway, Filter, Row, SubscriptionId};
use crate::entities::tables;
use crate::error::{EduConnectSDKError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 32;
const UNIQUE_VIOLATION_CODE: &str = "23505";

struct Subscriber {
    table: String,
    filter: Filter,
    sender: mpsc::Sender<ChangeEvent>,
}

/// 内存网关
pub struct MemoryGateway {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    /// 每表注册的唯一键（列名组合）
    unique_keys: HashMap<String, Vec<Vec<String>>>,
    blobs: RwLock<HashMap<(String, String), Vec<u8>>>,
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_subscription_id: AtomicU64,
    /// 故障注入：对这些表的读写返回瞬时网络错误
    failing_tables: RwLock<HashSet<String>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            unique_keys: HashMap::new(),
            blobs: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(1),
            failing_tables: RwLock::new(HashSet::new()),
        }
    }

    /// 注册一个唯一键约束
    pub fn with_unique_key(mut self, table: &str, columns: &[&str]) -> Self {
        self.unique_keys
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// 带 EduConnect 表结构约束的网关
    ///
    /// 唯一约束与托管存储中的 schema 对应：
    /// 每 (user, type) 至多一份材料；(user, university) 收藏对不重复。
    pub fn with_educonnect_schema() -> Self {
        Self::new()
            .with_unique_key(tables::STUDENT_DOCUMENTS, &["user_id", "document_type"])
            .with_unique_key(
                tables::STUDENT_SAVED_UNIVERSITIES,
                &["user_id", "university_id"],
            )
    }

    /// 打开/关闭某张表的故障注入
    pub async fn set_table_failure(&self, table: &str, failing: bool) {
        let mut failing_tables = self.failing_tables.write().await;
        if failing {
            failing_tables.insert(table.to_string());
        } else {
            failing_tables.remove(table);
        }
    }

    /// 当前打开的订阅句柄数（资源泄漏校验用）
    pub async fn open_subscriptions(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// 某张表的行数
    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table).map(|rows| rows.len()).unwrap_or(0)
    }

    /// 某个对象是否存在
    pub async fn blob_exists(&self, bucket: &str, key: &str) -> bool {
        let blobs = self.blobs.read().await;
        blobs.contains_key(&(bucket.to_string(), key.to_string()))
    }

    async fn check_available(&self, table: &str) -> Result<()> {
        let failing_tables = self.failing_tables.read().await;
        if failing_tables.contains(table) {
            return Err(EduConnectSDKError::Transient(format!(
                "gateway unreachable for table {}",
                table
            )));
        }
        Ok(())
    }

    fn unique_violation(&self, table: &str, row: &Row, existing: &[Row]) -> Option<Vec<String>> {
        let keys = self.unique_keys.get(table)?;
        for key in keys {
            let candidate: Vec<Option<&Value>> = key.iter().map(|c| row.get(c)).collect();
            if candidate.iter().any(|v| v.is_none()) {
                continue;
            }
            let duplicate = existing.iter().any(|other| {
                key.iter()
                    .zip(&candidate)
                    .all(|(c, v)| other.get(c) == *v)
            });
            if duplicate {
                return Some(key.clone());
            }
        }
        None
    }

    /// 向过滤器匹配变更行的订阅者投递事件
    async fn notify(&self, table: &str, row: &Row) {
        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.values() {
            if subscriber.table != table || !subscriber.filter.matches(row) {
                continue;
            }
            let event = ChangeEvent {
                table: table.to_string(),
            };
            // 接收端满或已关闭都不算错误（订阅释放路径会清掉发送端）
            if let Err(e) = subscriber.sender.try_send(event) {
                debug!("change event dropped for table {}: {}", table, e);
            }
        }
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataGateway for MemoryGateway {
    async fn select(&self, table: &str, filter: &Filter) -> Result<Vec<Row>> {
        self.check_available(table).await?;
        let tables = self.tables.read().await;
        let rows = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row> {
        self.check_available(table).await?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(key) = self.unique_violation(table, &row, rows) {
            return Err(EduConnectSDKError::conflict_with_code(
                format!("duplicate key on ({}) in {}", key.join(", "), table),
                UNIQUE_VIOLATION_CODE,
            ));
        }

        let has_id = matches!(row.get("id"), Some(Value::String(s)) if !s.is_empty());
        if !has_id {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        rows.push(row.clone());
        drop(tables);

        self.notify(table, &row).await;
        Ok(row)
    }

    async fn update(&self, table: &str, filter: &Filter, patch: Row) -> Result<()> {
        self.check_available(table).await?;
        let mut changed = Vec::new();
        {
            let mut tables = self.tables.write().await;
            if let Some(rows) = tables.get_mut(table) {
                for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                    for (column, value) in &patch {
                        row.insert(column.clone(), value.clone());
                    }
                    changed.push(row.clone());
                }
            }
        }
        for row in &changed {
            self.notify(table, row).await;
        }
        Ok(())
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<()> {
        self.check_available(table).await?;
        let mut removed = Vec::new();
        {
            let mut tables = self.tables.write().await;
            if let Some(rows) = tables.get_mut(table) {
                rows.retain(|row| {
                    if filter.matches(row) {
                        removed.push(row.clone());
                        false
                    } else {
                        true
                    }
                });
            }
        }
        for row in &removed {
            self.notify(table, row).await;
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, mut row: Row, conflict_key: &[&str]) -> Result<()> {
        self.check_available(table).await?;
        let stored;
        {
            let mut tables = self.tables.write().await;
            let rows = tables.entry(table.to_string()).or_default();

            let existing = rows.iter_mut().find(|other| {
                conflict_key
                    .iter()
                    .all(|column| other.get(*column) == row.get(*column))
            });

            match existing {
                Some(other) => {
                    // 冲突键命中：覆盖写，保留原行 id
                    let id = other.get("id").cloned();
                    for (column, value) in &row {
                        other.insert(column.clone(), value.clone());
                    }
                    if let Some(id) = id {
                        other.insert("id".into(), id);
                    }
                    stored = other.clone();
                }
                None => {
                    let has_id = matches!(row.get("id"), Some(Value::String(s)) if !s.is_empty());
                    if !has_id {
                        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
                    }
                    rows.push(row.clone());
                    stored = row;
                }
            }
        }
        self.notify(table, &stored).await;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryGateway {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, overwrite: bool) -> Result<()> {
        let mut blobs = self.blobs.write().await;
        let blob_key = (bucket.to_string(), key.to_string());
        if !overwrite && blobs.contains_key(&blob_key) {
            return Err(EduConnectSDKError::Blob(format!(
                "object already exists: {}/{}",
                bucket, key
            )));
        }
        blobs.insert(blob_key, bytes);
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("memory://{}/{}", bucket, key)
    }
}

#[async_trait]
impl ChangeFeed for MemoryGateway {
    async fn subscribe(
        &self,
        table: &str,
        filter: Filter,
    ) -> Result<(SubscriptionId, mpsc::Receiver<ChangeEvent>)> {
        let (sender, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(
            id,
            Subscriber {
                table: table.to_string(),
                filter,
                sender,
            },
        );
        debug!("subscription {} opened on {}", id, table);
        Ok((id, receiver))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let mut subscribers = self.subscribers.write().await;
        match subscribers.remove(&id) {
            Some(subscriber) => {
                debug!("subscription {} released on {}", id, subscriber.table);
                Ok(())
            }
            None => Err(EduConnectSDKError::NotFound(format!(
                "subscription {} is not open",
                id
            ))),
        }
    }
}
