//! 实体加载器
//!
//! 契约：给定当前会话身份，拉取一种实体的全部行（目录按发布标记过滤），
//! 把对应切片整体替换掉。空结果是空切片，不是错误。
//! 不同实体的加载器相互独立：一个失败只记日志，不影响其它加载器，
//! 该切片保持上一次的值。

use crate::entities::{
    tables, Application, CatalogEntry, DocumentRecord, DocumentRow, DocumentType, Program,
    SavedRow, StudentProfile, UniversityProfile,
};
use crate::error::Result;
use crate::gateway::{from_row, to_row, DataGateway, Filter};
use crate::session::{UserRole, UserSession};
use crate::store::ViewStateStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// 加载器种类 - 受控枚举
///
/// 订阅管理器用它把"某张表变了"映射回要重跑的加载器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoaderKind {
    Profile,
    Documents,
    Saved,
    Applications,
    Catalog,
    UniversityProfile,
    Programs,
}

impl LoaderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Documents => "documents",
            Self::Saved => "saved",
            Self::Applications => "applications",
            Self::Catalog => "catalog",
            Self::UniversityProfile => "university_profile",
            Self::Programs => "programs",
        }
    }

    /// 表名 -> 加载器（同一张表对学生和大学意味着不同切片）
    pub fn for_table(table: &str, role: UserRole) -> Option<LoaderKind> {
        match (table, role) {
            (tables::STUDENT_PROFILES, UserRole::Student) => Some(Self::Profile),
            (tables::STUDENT_DOCUMENTS, UserRole::Student) => Some(Self::Documents),
            (tables::STUDENT_SAVED_UNIVERSITIES, UserRole::Student) => Some(Self::Saved),
            (tables::STUDENT_APPLICATIONS, UserRole::Student) => Some(Self::Applications),
            (tables::UNIVERSITY_PROFILES, UserRole::Student) => Some(Self::Catalog),
            (tables::UNIVERSITY_PROGRAMS, UserRole::Student) => Some(Self::Catalog),
            (tables::UNIVERSITY_PROFILES, UserRole::University) => Some(Self::UniversityProfile),
            (tables::UNIVERSITY_PROGRAMS, UserRole::University) => Some(Self::Programs),
            _ => None,
        }
    }
}

impl std::fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 实体加载器集合
pub struct EntityLoaders {
    gateway: Arc<dyn DataGateway>,
    store: Arc<ViewStateStore>,
    session: UserSession,
}

impl EntityLoaders {
    pub fn new(
        gateway: Arc<dyn DataGateway>,
        store: Arc<ViewStateStore>,
        session: UserSession,
    ) -> Self {
        Self {
            gateway,
            store,
            session,
        }
    }

    pub fn session(&self) -> &UserSession {
        &self.session
    }

    fn owner_filter(&self) -> Filter {
        Filter::new().eq("user_id", self.session.user_id.clone())
    }

    /// 按种类重跑一个加载器（订阅事件的粗粒度失效入口）
    pub async fn reload(&self, kind: LoaderKind) -> Result<()> {
        match kind {
            LoaderKind::Profile => self.load_profile().await,
            LoaderKind::Documents => self.load_documents().await,
            LoaderKind::Saved => self.load_saved().await,
            LoaderKind::Applications => self.load_applications().await,
            LoaderKind::Catalog => self.load_catalog().await,
            LoaderKind::UniversityProfile => self.load_university_profile().await,
            LoaderKind::Programs => self.load_programs().await,
        }
    }

    /// 学生档案（每用户至多一行；不存在则切片为 None）
    pub async fn load_profile(&self) -> Result<()> {
        let rows = self
            .gateway
            .select(tables::STUDENT_PROFILES, &self.owner_filter())
            .await?;
        let profile = rows
            .into_iter()
            .next()
            .map(from_row::<StudentProfile>)
            .transpose()?;
        self.store.replace_profile(profile).await;
        Ok(())
    }

    /// 申请材料：总是物化固定五槽列表，没有行的槽位为 pending
    pub async fn load_documents(&self) -> Result<()> {
        let rows = self
            .gateway
            .select(tables::STUDENT_DOCUMENTS, &self.owner_filter())
            .await?;

        let mut by_type: HashMap<DocumentType, DocumentRow> = HashMap::new();
        for row in rows {
            match from_row::<DocumentRow>(row) {
                Ok(doc) => {
                    by_type.insert(doc.document_type, doc);
                }
                Err(e) => warn!("skipping malformed document row: {}", e),
            }
        }

        let documents: Vec<DocumentRecord> = DocumentType::ALL
            .into_iter()
            .map(|doc_type| match by_type.remove(&doc_type) {
                Some(doc) => DocumentRecord {
                    doc_type,
                    status: doc.status,
                    file_name: doc.file_name,
                    file_url: doc.file_url,
                    id: doc.id,
                },
                None => DocumentRecord::pending(doc_type),
            })
            .collect();

        debug!("documents loaded: {} slots", documents.len());
        self.store.replace_documents(documents).await;
        Ok(())
    }

    /// 收藏集合（存在即收藏）
    pub async fn load_saved(&self) -> Result<()> {
        let rows = self
            .gateway
            .select(tables::STUDENT_SAVED_UNIVERSITIES, &self.owner_filter())
            .await?;
        let mut saved = HashSet::new();
        for row in rows {
            let entry: SavedRow = from_row(row)?;
            saved.insert(entry.university_id);
        }
        debug!("saved universities loaded: {}", saved.len());
        self.store.replace_saved(saved).await;
        Ok(())
    }

    /// 申请记录
    pub async fn load_applications(&self) -> Result<()> {
        let rows = self
            .gateway
            .select(tables::STUDENT_APPLICATIONS, &self.owner_filter())
            .await?;
        let mut applications = Vec::with_capacity(rows.len());
        for row in rows {
            applications.push(from_row::<Application>(row)?);
        }
        debug!("applications loaded: {}", applications.len());
        self.store.replace_applications(applications).await;
        Ok(())
    }

    /// 学生可见目录：已发布大学 + 各自已发布的专业
    pub async fn load_catalog(&self) -> Result<()> {
        let published = Filter::new().eq("is_published", true);
        let rows = self
            .gateway
            .select(tables::UNIVERSITY_PROFILES, &published)
            .await?;

        let mut catalog = Vec::with_capacity(rows.len());
        for row in rows {
            let profile: UniversityProfile = from_row(row)?;
            let program_rows = self
                .gateway
                .select(
                    tables::UNIVERSITY_PROGRAMS,
                    &Filter::new()
                        .eq("university_id", profile.id.clone())
                        .eq("is_published", true),
                )
                .await?;
            let mut programs = Vec::with_capacity(program_rows.len());
            for program_row in program_rows {
                programs.push(from_row::<Program>(program_row)?);
            }
            catalog.push(CatalogEntry { profile, programs });
        }

        debug!("catalog loaded: {} universities", catalog.len());
        self.store.replace_catalog(catalog).await;
        Ok(())
    }

    /// 大学自己的档案；首次访问时懒创建占位行
    pub async fn load_university_profile(&self) -> Result<()> {
        let own = Filter::new().eq("id", self.session.user_id.clone());
        let mut rows = self
            .gateway
            .select(tables::UNIVERSITY_PROFILES, &own)
            .await?;

        if rows.is_empty() {
            let placeholder = UniversityProfile {
                id: self.session.user_id.clone(),
                name: self
                    .session
                    .institution
                    .clone()
                    .unwrap_or_else(|| "Your Institution".to_string()),
                contact_email: Some(self.session.email.clone()),
                is_published: false,
                ..Default::default()
            };
            debug!("creating placeholder university profile for {}", self.session.user_id);
            self.gateway
                .insert(tables::UNIVERSITY_PROFILES, to_row(&placeholder)?)
                .await?;
            rows = self
                .gateway
                .select(tables::UNIVERSITY_PROFILES, &own)
                .await?;
        }

        let profile = rows
            .into_iter()
            .next()
            .map(from_row::<UniversityProfile>)
            .transpose()?;
        self.store.replace_university_profile(profile).await;
        Ok(())
    }

    /// 大学自己的全部专业（含未发布的，owner 视角）
    pub async fn load_programs(&self) -> Result<()> {
        let rows = self
            .gateway
            .select(
                tables::UNIVERSITY_PROGRAMS,
                &Filter::new().eq("university_id", self.session.user_id.clone()),
            )
            .await?;
        let mut programs = Vec::with_capacity(rows.len());
        for row in rows {
            programs.push(from_row::<Program>(row)?);
        }
        debug!("programs loaded: {}", programs.len());
        self.store.replace_programs(programs).await;
        Ok(())
    }

    /// 会话建立时的全量并行加载
    ///
    /// 各加载器独立失败：出错只记日志，该切片保持原值；
    /// 全部结束后才关掉 loading 标记。
    pub async fn load_all(&self) {
        match self.session.role {
            UserRole::Student => {
                tokio::join!(
                    self.run(LoaderKind::Profile),
                    self.run(LoaderKind::Documents),
                    self.run(LoaderKind::Saved),
                    self.run(LoaderKind::Applications),
                    self.run(LoaderKind::Catalog),
                );
            }
            UserRole::University => {
                tokio::join!(
                    self.run(LoaderKind::UniversityProfile),
                    self.run(LoaderKind::Programs),
                );
            }
        }
        self.store.set_loading(false).await;
    }

    async fn run(&self, kind: LoaderKind) {
        if let Err(e) = self.reload(kind).await {
            warn!("loader {} failed: {}", kind, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DocumentStatus;
    use crate::gateway::MemoryGateway;
    use serde_json::json;

    fn student_loaders(gateway: Arc<MemoryGateway>) -> (EntityLoaders, Arc<ViewStateStore>) {
        let store = Arc::new(ViewStateStore::new());
        let loaders = EntityLoaders::new(
            gateway,
            store.clone(),
            UserSession::student("s-1", "s1@example.com"),
        );
        (loaders, store)
    }

    #[tokio::test]
    async fn empty_results_yield_empty_slices() {
        let gateway = Arc::new(MemoryGateway::with_educonnect_schema());
        let (loaders, store) = student_loaders(gateway);

        loaders.load_all().await;

        assert!(store.profile().await.is_none());
        assert!(store.saved().await.is_empty());
        assert!(store.applications().await.is_empty());
        assert!(store.catalog().await.is_empty());
        // 材料切片是固定五槽列表，全部 pending
        let documents = store.documents().await;
        assert_eq!(documents.len(), 5);
        assert!(documents.iter().all(|d| d.status == DocumentStatus::Pending));
        assert!(!store.is_loading().await);
    }

    #[tokio::test]
    async fn documents_loader_materializes_fixed_list() {
        let gateway = Arc::new(MemoryGateway::with_educonnect_schema());
        gateway
            .insert(
                tables::STUDENT_DOCUMENTS,
                to_row(&DocumentRow {
                    id: None,
                    user_id: "s-1".into(),
                    document_type: DocumentType::IeltsScore,
                    file_name: Some("ielts.pdf".into()),
                    file_url: Some("memory://student-documents/s-1/ielts-score.pdf".into()),
                    status: DocumentStatus::Uploaded,
                })
                .unwrap(),
            )
            .await
            .unwrap();
        // 别的用户的行不应进入切片
        gateway
            .insert(
                tables::STUDENT_DOCUMENTS,
                to_row(&DocumentRow {
                    id: None,
                    user_id: "s-2".into(),
                    document_type: DocumentType::CvResume,
                    file_name: None,
                    file_url: None,
                    status: DocumentStatus::Uploaded,
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let (loaders, store) = student_loaders(gateway);
        loaders.load_documents().await.unwrap();

        let documents = store.documents().await;
        assert_eq!(documents.len(), 5);
        for record in &documents {
            if record.doc_type == DocumentType::IeltsScore {
                assert_eq!(record.status, DocumentStatus::Uploaded);
                assert_eq!(record.file_name.as_deref(), Some("ielts.pdf"));
            } else {
                assert_eq!(record.status, DocumentStatus::Pending);
            }
        }
    }

    #[tokio::test]
    async fn catalog_only_contains_published_rows() {
        let gateway = Arc::new(MemoryGateway::with_educonnect_schema());
        for (id, published) in [("uni-pub", true), ("uni-hidden", false)] {
            gateway
                .insert(
                    tables::UNIVERSITY_PROFILES,
                    to_row(&UniversityProfile {
                        id: id.into(),
                        name: id.into(),
                        is_published: published,
                        ..Default::default()
                    })
                    .unwrap(),
                )
                .await
                .unwrap();
        }
        for (title, published) in [("MSc CS", true), ("Draft", false)] {
            gateway
                .insert(
                    tables::UNIVERSITY_PROGRAMS,
                    to_row(&Program {
                        id: None,
                        university_id: "uni-pub".into(),
                        title: title.into(),
                        degree_level: None,
                        duration: None,
                        tuition_fee: None,
                        description: None,
                        delivery_mode: None,
                        application_deadline: None,
                        is_published: published,
                    })
                    .unwrap(),
                )
                .await
                .unwrap();
        }

        let (loaders, store) = student_loaders(gateway);
        loaders.load_catalog().await.unwrap();

        let catalog = store.catalog().await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].profile.id, "uni-pub");
        assert_eq!(catalog[0].programs.len(), 1);
        assert_eq!(catalog[0].programs[0].title, "MSc CS");
    }

    #[tokio::test]
    async fn university_profile_is_created_lazily() {
        let gateway = Arc::new(MemoryGateway::with_educonnect_schema());
        let store = Arc::new(ViewStateStore::new());
        let session = UserSession::university("u-1", "cms@example.edu")
            .with_institution("Example University");
        let loaders = EntityLoaders::new(gateway.clone(), store.clone(), session);

        loaders.load_university_profile().await.unwrap();

        let profile = store.university_profile().await.unwrap();
        assert_eq!(profile.id, "u-1");
        assert_eq!(profile.name, "Example University");
        assert_eq!(profile.contact_email.as_deref(), Some("cms@example.edu"));
        assert!(!profile.is_published);
        assert_eq!(gateway.row_count(tables::UNIVERSITY_PROFILES).await, 1);

        // 第二次加载不再创建
        loaders.load_university_profile().await.unwrap();
        assert_eq!(gateway.row_count(tables::UNIVERSITY_PROFILES).await, 1);
    }

    #[tokio::test]
    async fn failed_loader_keeps_previous_slice_and_does_not_block_others() {
        let gateway = Arc::new(MemoryGateway::with_educonnect_schema());
        gateway
            .insert(
                tables::STUDENT_SAVED_UNIVERSITIES,
                to_row(&SavedRow {
                    id: None,
                    user_id: "s-1".into(),
                    university_id: "uni-1".into(),
                })
                .unwrap(),
            )
            .await
            .unwrap();

        let (loaders, store) = student_loaders(gateway.clone());
        loaders.load_all().await;
        assert!(store.is_saved("uni-1").await);

        // 收藏表故障，其它加载器不受影响，收藏切片保持原值
        gateway.set_table_failure(tables::STUDENT_SAVED_UNIVERSITIES, true).await;
        gateway
            .insert(
                tables::STUDENT_APPLICATIONS,
                to_row(&Application {
                    id: None,
                    user_id: "s-1".into(),
                    university_id: "uni-1".into(),
                    program_id: None,
                    status: "submitted".into(),
                    application_date: chrono::Utc::now(),
                })
                .unwrap(),
            )
            .await
            .unwrap();

        loaders.load_all().await;
        assert!(store.is_saved("uni-1").await);
        assert_eq!(store.applications().await.len(), 1);
    }

    #[test]
    fn loader_kind_for_table_depends_on_role() {
        assert_eq!(
            LoaderKind::for_table(tables::UNIVERSITY_PROFILES, UserRole::Student),
            Some(LoaderKind::Catalog)
        );
        assert_eq!(
            LoaderKind::for_table(tables::UNIVERSITY_PROFILES, UserRole::University),
            Some(LoaderKind::UniversityProfile)
        );
        assert_eq!(
            LoaderKind::for_table(tables::STUDENT_DOCUMENTS, UserRole::University),
            None
        );
    }
}
