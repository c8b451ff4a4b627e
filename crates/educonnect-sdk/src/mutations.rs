//! 变更处理器
//!
//! 每个处理器执行且只执行一个逻辑操作，并且是终端错误边界：
//! 内部步骤失败在调用点被捕获、转成用户可见通知，绝不向上传播，
//! 也绝不触达全局错误处理。最坏情况是切片过期 + 一条失败通知。

use crate::entities::{buckets, tables, Application, DocumentRow, DocumentStatus, DocumentType,
    NewProgram, Program, SavedRow, StudentProfile, UniversityProfile};
use crate::error::{EduConnectSDKError, Result};
use crate::gateway::{to_row, BlobStore, DataGateway, Filter};
use crate::loaders::EntityLoaders;
use crate::notify::{Notification, NotificationCenter};
use crate::session::UserSession;
use crate::store::ViewStateStore;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// 变更处理器集合
pub struct MutationHandlers {
    gateway: Arc<dyn DataGateway>,
    blobs: Arc<dyn BlobStore>,
    store: Arc<ViewStateStore>,
    loaders: Arc<EntityLoaders>,
    notifications: Arc<NotificationCenter>,
    session: UserSession,
}

/// 从文件名取扩展名；没有 '.' 时整个文件名充当扩展名（与行键派生规则一致）
fn file_extension(file_name: &str) -> &str {
    file_name.rsplit('.').next().unwrap_or(file_name)
}

impl MutationHandlers {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        blobs: Arc<dyn BlobStore>,
        store: Arc<ViewStateStore>,
        loaders: Arc<EntityLoaders>,
        notifications: Arc<NotificationCenter>,
        session: UserSession,
    ) -> Self {
        Self {
            gateway,
            blobs,
            store,
            loaders,
            notifications,
            session,
        }
    }

    // --- 学生侧 ---

    /// 上传一份申请材料
    ///
    /// 存储键由 (user id, 归一化类型, 扩展名) 确定性派生，允许覆盖写
    /// （同键最后写入胜出，不做版本化）；行 upsert 到 (user, type)。
    /// 成功后整体重载材料切片（以权威行为准，不做乐观补丁）。
    pub async fn upload_document(&self, doc_type: DocumentType, file_name: &str, bytes: Vec<u8>) {
        match self.try_upload_document(doc_type, file_name, bytes).await {
            Ok(()) => {
                info!("document uploaded: {}", doc_type);
                self.notifications.emit(Notification::success(
                    "Document uploaded successfully",
                    format!("{} has been uploaded.", doc_type),
                ));
            }
            Err(e) => {
                warn!("document upload failed: {}", e);
                self.notifications
                    .emit(Notification::error("Upload failed", e.to_string()));
            }
        }
    }

    async fn try_upload_document(
        &self,
        doc_type: DocumentType,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let key = format!(
            "{}/{}.{}",
            self.session.user_id,
            doc_type.storage_slug(),
            file_extension(file_name)
        );
        self.blobs
            .put(buckets::STUDENT_DOCUMENTS, &key, bytes, true)
            .await?;
        let file_url = self.blobs.public_url(buckets::STUDENT_DOCUMENTS, &key);

        let row = DocumentRow {
            id: None,
            user_id: self.session.user_id.clone(),
            document_type: doc_type,
            file_name: Some(file_name.to_string()),
            file_url: Some(file_url),
            status: DocumentStatus::Uploaded,
        };
        self.gateway
            .upsert(
                tables::STUDENT_DOCUMENTS,
                to_row(&row)?,
                &["user_id", "document_type"],
            )
            .await?;

        self.loaders.load_documents().await
    }

    /// 收藏/取消收藏一所大学
    ///
    /// 先查本地集合再写网关；插入走 (user, university) 冲突键的 upsert，
    /// 两次并发收藏也不会产生重复行。成功后乐观更新本地集合，
    /// 严格串行的两次 toggle 保证回到原始成员状态。
    pub async fn toggle_saved(&self, university_id: &str) {
        if let Err(e) = self.try_toggle_saved(university_id).await {
            warn!("toggle saved failed for {}: {}", university_id, e);
            self.notifications
                .emit(Notification::error("Error", e.to_string()));
        }
    }

    async fn try_toggle_saved(&self, university_id: &str) -> Result<()> {
        if self.store.is_saved(university_id).await {
            self.gateway
                .delete(
                    tables::STUDENT_SAVED_UNIVERSITIES,
                    &Filter::new()
                        .eq("user_id", self.session.user_id.clone())
                        .eq("university_id", university_id),
                )
                .await?;
            self.store.mark_unsaved(university_id).await;
        } else {
            let row = SavedRow {
                id: None,
                user_id: self.session.user_id.clone(),
                university_id: university_id.to_string(),
            };
            self.gateway
                .upsert(
                    tables::STUDENT_SAVED_UNIVERSITIES,
                    to_row(&row)?,
                    &["user_id", "university_id"],
                )
                .await?;
            self.store.mark_saved(university_id).await;
        }
        Ok(())
    }

    /// 提交一份申请
    ///
    /// 不做幂等：对同一目录条目调用两次就是两行（防重复申请明确不在范围内）。
    pub async fn apply(&self, university_id: &str, program_id: Option<&str>) {
        let application = Application {
            id: None,
            user_id: self.session.user_id.clone(),
            university_id: university_id.to_string(),
            program_id: program_id.map(String::from),
            status: "submitted".to_string(),
            application_date: Utc::now(),
        };
        let result: Result<()> = async {
            self.gateway
                .insert(tables::STUDENT_APPLICATIONS, to_row(&application)?)
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => self.notifications.emit(Notification::success(
                "Application submitted",
                "Your application has been submitted successfully.",
            )),
            Err(e) => {
                warn!("application failed for {}: {}", university_id, e);
                self.notifications
                    .emit(Notification::error("Application failed", e.to_string()));
            }
        }
    }

    /// 保存学生档案：整行写入全部可编辑字段，不做字段级 diff
    pub async fn save_profile(&self, profile: StudentProfile) {
        let result: Result<()> = async {
            self.gateway
                .upsert(tables::STUDENT_PROFILES, to_row(&profile)?, &["user_id"])
                .await?;
            self.store.replace_profile(Some(profile)).await;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => self
                .notifications
                .emit(Notification::success("Profile saved", "")),
            Err(e) => {
                warn!("profile save failed: {}", e);
                self.notifications
                    .emit(Notification::error("Failed to save", e.to_string()));
            }
        }
    }

    // --- 大学侧 ---

    /// 保存大学公开档案（含发布标记），按大学 id 整体更新
    pub async fn save_university_profile(&self, profile: UniversityProfile) {
        let result: Result<()> = async {
            self.gateway
                .update(
                    tables::UNIVERSITY_PROFILES,
                    &Filter::new().eq("id", self.session.user_id.clone()),
                    to_row(&profile)?,
                )
                .await?;
            self.store.replace_university_profile(Some(profile)).await;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => self
                .notifications
                .emit(Notification::success("Profile saved", "")),
            Err(e) => {
                warn!("university profile save failed: {}", e);
                self.notifications
                    .emit(Notification::error("Failed to save", e.to_string()));
            }
        }
    }

    /// 上传院校 Logo
    ///
    /// 键含毫秒时间戳，不允许覆盖；成功后把公开 URL 写回档案行。
    pub async fn upload_logo(&self, file_name: &str, bytes: Vec<u8>) {
        let result: Result<()> = async {
            let key = format!(
                "{}/logo-{}.{}",
                self.session.user_id,
                Utc::now().timestamp_millis(),
                file_extension(file_name)
            );
            self.blobs
                .put(buckets::UNIVERSITIES, &key, bytes, false)
                .await?;
            let logo_url = self.blobs.public_url(buckets::UNIVERSITIES, &key);

            let mut patch = crate::gateway::Row::new();
            patch.insert("logo_url".into(), serde_json::Value::String(logo_url));
            self.gateway
                .update(
                    tables::UNIVERSITY_PROFILES,
                    &Filter::new().eq("id", self.session.user_id.clone()),
                    patch,
                )
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => self
                .notifications
                .emit(Notification::success("Logo updated", "")),
            Err(e) => {
                warn!("logo upload failed: {}", e);
                self.notifications
                    .emit(Notification::error("Upload failed", e.to_string()));
            }
        }
    }

    /// 新建专业项目（归属当前大学，发布标记默认 true）
    ///
    /// 空标题在任何网关调用之前被校验拦截，不产生状态变更。
    pub async fn create_program(&self, new_program: NewProgram) {
        match self.try_create_program(new_program).await {
            Ok(()) => self
                .notifications
                .emit(Notification::success("Program added", "")),
            Err(e) => {
                warn!("program create failed: {}", e);
                self.notifications
                    .emit(Notification::error("Failed to add program", e.to_string()));
            }
        }
    }

    async fn try_create_program(&self, new_program: NewProgram) -> Result<()> {
        if new_program.title.trim().is_empty() {
            return Err(EduConnectSDKError::Validation(
                "program title is required".to_string(),
            ));
        }
        let program = Program {
            id: None,
            university_id: self.session.user_id.clone(),
            title: new_program.title,
            degree_level: new_program.degree_level,
            duration: new_program.duration,
            tuition_fee: new_program.tuition_fee,
            description: new_program.description,
            delivery_mode: new_program.delivery_mode,
            application_deadline: new_program.application_deadline,
            is_published: true,
        };
        self.gateway
            .insert(tables::UNIVERSITY_PROGRAMS, to_row(&program)?)
            .await?;
        Ok(())
    }

    /// 按 id 删除专业项目（行本身的归属范围之外不再做所有权复查）
    pub async fn delete_program(&self, program_id: &str) {
        let result = self
            .gateway
            .delete(
                tables::UNIVERSITY_PROGRAMS,
                &Filter::new().eq("id", program_id),
            )
            .await;

        match result {
            Ok(()) => self
                .notifications
                .emit(Notification::success("Program deleted", "")),
            Err(e) => {
                warn!("program delete failed for {}: {}", program_id, e);
                self.notifications
                    .emit(Notification::error("Failed to delete", e.to_string()));
            }
        }
    }
}
