//! 视图模型与表结构定义
//!
//! 远端托管存储中的行（Row）与本地视图模型之间的映射都在这里：
//! - 学生侧：档案、申请材料、收藏、申请记录
//! - 大学侧：公开档案、专业项目
//! - 学生可见目录：已发布的大学档案 + 其已发布专业
//!
//! 每个实体行都由其 user_id / university_id 归属键独占；
//! 本地切片只是可能过期的只读副本，网关是唯一事实来源。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 表名常量（与托管存储中的表一一对应）
pub mod tables {
    pub const STUDENT_PROFILES: &str = "student_profiles";
    pub const STUDENT_DOCUMENTS: &str = "student_documents";
    pub const STUDENT_SAVED_UNIVERSITIES: &str = "student_saved_universities";
    pub const STUDENT_APPLICATIONS: &str = "student_applications";
    pub const UNIVERSITY_PROFILES: &str = "university_profiles";
    pub const UNIVERSITY_PROGRAMS: &str = "university_programs";
}

/// 对象存储桶名常量
pub mod buckets {
    /// 学生申请材料桶
    pub const STUDENT_DOCUMENTS: &str = "student-documents";
    /// 大学资源桶（Logo 等）
    pub const UNIVERSITIES: &str = "universities";
}

/// 申请材料类型 - 受控枚举
///
/// 固定集合；每个 (user, type) 至多一行，由 upsert 冲突键保证。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "Academic Transcripts")]
    AcademicTranscripts,
    #[serde(rename = "CV/Resume")]
    CvResume,
    #[serde(rename = "IELTS Score")]
    IeltsScore,
    #[serde(rename = "Personal Statement")]
    PersonalStatement,
    #[serde(rename = "Letters of Recommendation")]
    LettersOfRecommendation,
}

impl DocumentType {
    /// 全部类型（顺序即 UI 展示顺序）
    pub const ALL: [DocumentType; 5] = [
        Self::AcademicTranscripts,
        Self::CvResume,
        Self::IeltsScore,
        Self::PersonalStatement,
        Self::LettersOfRecommendation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcademicTranscripts => "Academic Transcripts",
            Self::CvResume => "CV/Resume",
            Self::IeltsScore => "IELTS Score",
            Self::PersonalStatement => "Personal Statement",
            Self::LettersOfRecommendation => "Letters of Recommendation",
        }
    }

    /// 存储键片段：小写、空白折叠为 '-'
    ///
    /// 与行键派生规则一致，保证同一 (user, type) 覆盖写同一个对象。
    pub fn storage_slug(self) -> String {
        self.as_str()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl FromStr for DocumentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 材料上传状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Uploaded,
}

/// student_documents 表的行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRow {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub document_type: DocumentType,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
    pub status: DocumentStatus,
}

/// 材料视图模型：固定五槽列表中的一格
///
/// 加载器总是物化全部五种类型；没有对应行的槽位状态为 pending。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub doc_type: DocumentType,
    pub status: DocumentStatus,
    pub file_name: Option<String>,
    pub file_url: Option<String>,
    pub id: Option<String>,
}

impl DocumentRecord {
    pub fn pending(doc_type: DocumentType) -> Self {
        Self {
            doc_type,
            status: DocumentStatus::Pending,
            file_name: None,
            file_url: None,
            id: None,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        self.status == DocumentStatus::Uploaded
    }
}

/// 学生档案（student_profiles 表，每用户一行）
///
/// 懒创建：首次访问仪表盘时若不存在则保持 None，由宿主引导补全；
/// 仅归属用户可变更，范围内不做硬删除。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub user_id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub year_of_study: Option<String>,
    #[serde(default)]
    pub gpa: Option<String>,
}

/// 完整度公式中计入的必填字段数
pub const REQUIRED_PROFILE_FIELDS: usize = 7;

impl StudentProfile {
    /// 已填写的必填字段数（非空白才算填写）
    pub fn filled_required_fields(&self) -> usize {
        [
            &self.full_name,
            &self.email,
            &self.phone,
            &self.country,
            &self.specialization,
            &self.year_of_study,
            &self.gpa,
        ]
        .iter()
        .filter(|field| matches!(field, Some(v) if !v.trim().is_empty()))
        .count()
    }
}

/// 申请记录（student_applications 表，用户视角只增不改）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub university_id: String,
    #[serde(default)]
    pub program_id: Option<String>,
    /// 自由字符串，默认 "submitted"
    pub status: String,
    pub application_date: DateTime<Utc>,
}

/// 收藏行（student_saved_universities 表，存在即收藏）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRow {
    #[serde(default)]
    pub id: Option<String>,
    pub user_id: String,
    pub university_id: String,
}

/// 大学公开档案（university_profiles 表，id = 归属用户 id）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniversityProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// 发布标记：仅为 true 时对学生可见
    #[serde(default)]
    pub is_published: bool,
}

/// 专业项目（university_programs 表，大学档案的子实体）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub id: Option<String>,
    pub university_id: String,
    pub title: String,
    #[serde(default)]
    pub degree_level: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tuition_fee: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub delivery_mode: Option<String>,
    /// 申请截止日期（ISO 日期）
    #[serde(default)]
    pub application_deadline: Option<NaiveDate>,
    #[serde(default = "default_published")]
    pub is_published: bool,
}

fn default_published() -> bool {
    true
}

/// 新建专业项目的调用方字段集（发布标记默认 true）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProgram {
    pub title: String,
    #[serde(default)]
    pub degree_level: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub tuition_fee: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub delivery_mode: Option<String>,
    #[serde(default)]
    pub application_deadline: Option<NaiveDate>,
}

/// 目录条目：已发布大学档案 + 其已发布专业（读多写少投影）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub profile: UniversityProfile,
    pub programs: Vec<Program>,
}
