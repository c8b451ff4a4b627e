//! 用户会话 - 身份提供方（外部协作者）交付的只读输入
//!
//! 身份提供方在会话建立后同步提供用户 ID、邮箱和角色；
//! SDK 不负责登录/注册流程，只消费这里的会话快照。

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 用户角色（决定加载哪些切片、监听哪些表）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    University,
}

impl UserRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::University => "university",
        }
    }
}

impl FromStr for UserRole {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "university" => Ok(Self::University),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 用户会话快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    /// 用户 ID（所有实体行的归属键）
    pub user_id: String,
    /// 邮箱
    pub email: String,
    /// 角色
    pub role: UserRole,
    /// 显示名（注册元数据，可选）
    pub display_name: Option<String>,
    /// 院校名称（仅大学角色的注册元数据，可选）
    pub institution: Option<String>,
}

impl UserSession {
    pub fn student(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            role: UserRole::Student,
            display_name: None,
            institution: None,
        }
    }

    pub fn university(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            role: UserRole::University,
            display_name: None,
            institution: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_institution(mut self, institution: impl Into<String>) -> Self {
        self.institution = Some(institution.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_as_str_and_from_str() {
        assert_eq!(UserRole::Student.as_str(), "student");
        assert_eq!(UserRole::from_str("university").unwrap(), UserRole::University);
        assert!(UserRole::from_str("admin").is_err());
    }

    #[test]
    fn session_builders() {
        let session = UserSession::university("u-1", "cms@example.edu")
            .with_institution("Example University");
        assert_eq!(session.role, UserRole::University);
        assert_eq!(session.institution.as_deref(), Some("Example University"));
    }
}
