//! 视图状态存储
//!
//! 保存每个实体切片的最近一次加载快照，加上短暂的 UI 过滤状态。
//! 约束：
//! - 切片只被整体替换（加载器 wholesale replace），不做局部合并
//! - 每个切片一把锁、一条变更路径；每切片最终状态为最后写入者胜出
//! - 派生值（档案完整度）读取时计算，绝不冗余存储

use crate::entities::{
    Application, CatalogEntry, DocumentRecord, DocumentType, Program, StudentProfile,
    UniversityProfile, REQUIRED_PROFILE_FIELDS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::RwLock;

/// UI 过滤状态（国家 / 专业 / 预算上限）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    pub country: Option<String>,
    pub program: Option<String>,
    pub budget_max: Option<u32>,
}

/// 视图状态存储
///
/// 呈现层渲染的内存表示；网关是唯一事实来源，这里只是可能过期的副本。
#[derive(Debug, Default)]
pub struct ViewStateStore {
    profile: RwLock<Option<StudentProfile>>,
    documents: RwLock<Vec<DocumentRecord>>,
    saved: RwLock<HashSet<String>>,
    applications: RwLock<Vec<Application>>,
    catalog: RwLock<Vec<CatalogEntry>>,
    university_profile: RwLock<Option<UniversityProfile>>,
    programs: RwLock<Vec<Program>>,
    filters: RwLock<FilterState>,
    loading: RwLock<bool>,
}

impl ViewStateStore {
    pub fn new() -> Self {
        Self {
            loading: RwLock::new(true),
            ..Self::default()
        }
    }

    // --- 整体替换（加载器专用） ---

    pub async fn replace_profile(&self, profile: Option<StudentProfile>) {
        *self.profile.write().await = profile;
    }

    pub async fn replace_documents(&self, documents: Vec<DocumentRecord>) {
        *self.documents.write().await = documents;
    }

    pub async fn replace_saved(&self, saved: HashSet<String>) {
        *self.saved.write().await = saved;
    }

    pub async fn replace_applications(&self, applications: Vec<Application>) {
        *self.applications.write().await = applications;
    }

    pub async fn replace_catalog(&self, catalog: Vec<CatalogEntry>) {
        *self.catalog.write().await = catalog;
    }

    pub async fn replace_university_profile(&self, profile: Option<UniversityProfile>) {
        *self.university_profile.write().await = profile;
    }

    pub async fn replace_programs(&self, programs: Vec<Program>) {
        *self.programs.write().await = programs;
    }

    // --- 收藏集合（toggle 的乐观更新路径） ---

    pub async fn is_saved(&self, university_id: &str) -> bool {
        self.saved.read().await.contains(university_id)
    }

    pub async fn mark_saved(&self, university_id: &str) {
        self.saved.write().await.insert(university_id.to_string());
    }

    pub async fn mark_unsaved(&self, university_id: &str) {
        self.saved.write().await.remove(university_id);
    }

    // --- 快照读取 ---

    pub async fn profile(&self) -> Option<StudentProfile> {
        self.profile.read().await.clone()
    }

    pub async fn documents(&self) -> Vec<DocumentRecord> {
        self.documents.read().await.clone()
    }

    pub async fn saved(&self) -> HashSet<String> {
        self.saved.read().await.clone()
    }

    pub async fn applications(&self) -> Vec<Application> {
        self.applications.read().await.clone()
    }

    pub async fn catalog(&self) -> Vec<CatalogEntry> {
        self.catalog.read().await.clone()
    }

    pub async fn university_profile(&self) -> Option<UniversityProfile> {
        self.university_profile.read().await.clone()
    }

    pub async fn programs(&self) -> Vec<Program> {
        self.programs.read().await.clone()
    }

    pub async fn filters(&self) -> FilterState {
        self.filters.read().await.clone()
    }

    pub async fn set_filters(&self, filters: FilterState) {
        *self.filters.write().await = filters;
    }

    pub async fn is_loading(&self) -> bool {
        *self.loading.read().await
    }

    pub async fn set_loading(&self, loading: bool) {
        *self.loading.write().await = loading;
    }

    // --- 派生值 ---

    /// 档案完整度百分比
    ///
    /// 70% 权重给必填字段填写比例，30% 给固定材料清单的上传比例，
    /// 四舍五入到整数；未加载档案时为 0。
    pub async fn profile_completeness(&self) -> u8 {
        let profile = self.profile.read().await;
        let Some(profile) = profile.as_ref() else {
            return 0;
        };
        let filled = profile.filled_required_fields();

        let documents = self.documents.read().await;
        let uploaded = documents.iter().filter(|d| d.is_uploaded()).count();

        let field_term = filled as f64 / REQUIRED_PROFILE_FIELDS as f64 * 70.0;
        let document_term = uploaded as f64 / DocumentType::ALL.len() as f64 * 30.0;
        (field_term + document_term).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::DocumentStatus;

    fn profile_with_filled(filled: usize) -> StudentProfile {
        let mut profile = StudentProfile {
            user_id: "s-1".into(),
            ..Default::default()
        };
        let fields = [
            &mut profile.full_name,
            &mut profile.email,
            &mut profile.phone,
            &mut profile.country,
            &mut profile.specialization,
            &mut profile.year_of_study,
            &mut profile.gpa,
        ];
        for field in fields.into_iter().take(filled) {
            *field = Some("value".into());
        }
        profile
    }

    fn documents_with_uploaded(uploaded: usize) -> Vec<DocumentRecord> {
        DocumentType::ALL
            .into_iter()
            .enumerate()
            .map(|(i, doc_type)| {
                let mut record = DocumentRecord::pending(doc_type);
                if i < uploaded {
                    record.status = DocumentStatus::Uploaded;
                }
                record
            })
            .collect()
    }

    #[tokio::test]
    async fn completeness_is_zero_without_profile() {
        let store = ViewStateStore::new();
        assert_eq!(store.profile_completeness().await, 0);
    }

    #[tokio::test]
    async fn completeness_formula_matches_reference_case() {
        // 4/7 必填字段 + 3/5 材料 = round(40 + 30) = 70
        let store = ViewStateStore::new();
        store.replace_profile(Some(profile_with_filled(4))).await;
        store.replace_documents(documents_with_uploaded(3)).await;
        assert_eq!(store.profile_completeness().await, 70);
    }

    #[tokio::test]
    async fn completeness_extremes() {
        let store = ViewStateStore::new();
        store.replace_profile(Some(profile_with_filled(0))).await;
        store.replace_documents(documents_with_uploaded(0)).await;
        assert_eq!(store.profile_completeness().await, 0);

        store.replace_profile(Some(profile_with_filled(7))).await;
        store.replace_documents(documents_with_uploaded(5)).await;
        assert_eq!(store.profile_completeness().await, 100);
    }

    #[tokio::test]
    async fn document_term_never_decreases_with_more_uploads() {
        let store = ViewStateStore::new();
        store.replace_profile(Some(profile_with_filled(2))).await;

        let mut last = 0;
        for uploaded in 0..=5 {
            store
                .replace_documents(documents_with_uploaded(uploaded))
                .await;
            let completeness = store.profile_completeness().await;
            assert!(completeness >= last, "completeness decreased after upload");
            last = completeness;
        }
    }

    #[tokio::test]
    async fn slices_are_replaced_wholesale() {
        let store = ViewStateStore::new();
        store
            .replace_saved(["a".to_string(), "b".to_string()].into())
            .await;
        assert!(store.is_saved("a").await);

        // 整体替换，不做合并
        store.replace_saved(["c".to_string()].into()).await;
        assert!(!store.is_saved("a").await);
        assert!(store.is_saved("c").await);
    }

    #[tokio::test]
    async fn filter_state_is_set_wholesale() {
        let store = ViewStateStore::new();
        assert_eq!(store.filters().await, FilterState::default());

        store
            .set_filters(FilterState {
                country: Some("UK".into()),
                program: Some("Computer Science".into()),
                budget_max: Some(20_000),
            })
            .await;
        let filters = store.filters().await;
        assert_eq!(filters.country.as_deref(), Some("UK"));
        assert_eq!(filters.budget_max, Some(20_000));

        // 整体替换：清空过滤就是写回默认值
        store.set_filters(FilterState::default()).await;
        assert_eq!(store.filters().await, FilterState::default());
    }

    #[tokio::test]
    async fn loading_flag_starts_on() {
        let store = ViewStateStore::new();
        assert!(store.is_loading().await);
        store.set_loading(false).await;
        assert!(!store.is_loading().await);
    }
}
