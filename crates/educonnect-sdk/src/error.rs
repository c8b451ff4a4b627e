use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EduConnectSDKError {
    /// 瞬时网络错误（网关不可达/超时），不自动重试
    Transient(String),
    /// 校验错误：在任何网关调用之前被拦截
    Validation(String),
    /// 冲突错误（如唯一键冲突），原样上抛，不自动解决
    Conflict {
        message: String,
        code: Option<String>,
    },
    NotFound(String),
    InvalidArgument(String),
    Serialization(String),
    /// 对象存储错误
    Blob(String),
    /// 订阅通道错误
    Subscription(String),
    Other(String),
}

impl fmt::Display for EduConnectSDKError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EduConnectSDKError::Transient(e) => write!(f, "Transient network error: {}", e),
            EduConnectSDKError::Validation(e) => write!(f, "Validation error: {}", e),
            EduConnectSDKError::Conflict { message, code } => match code {
                Some(code) => write!(f, "Conflict [{}]: {}", code, message),
                None => write!(f, "Conflict: {}", message),
            },
            EduConnectSDKError::NotFound(e) => write!(f, "Not found: {}", e),
            EduConnectSDKError::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
            EduConnectSDKError::Serialization(e) => write!(f, "Serialization error: {}", e),
            EduConnectSDKError::Blob(e) => write!(f, "Blob store error: {}", e),
            EduConnectSDKError::Subscription(e) => write!(f, "Subscription error: {}", e),
            EduConnectSDKError::Other(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl std::error::Error for EduConnectSDKError {}

impl From<serde_json::Error> for EduConnectSDKError {
    fn from(error: serde_json::Error) -> Self {
        EduConnectSDKError::Serialization(error.to_string())
    }
}

impl EduConnectSDKError {
    /// 从网关唯一约束冲突创建冲突错误
    pub fn conflict(message: impl Into<String>) -> Self {
        EduConnectSDKError::Conflict {
            message: message.into(),
            code: None,
        }
    }

    pub fn conflict_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        EduConnectSDKError::Conflict {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// 判断是否为瞬时网络错误
    pub fn is_transient(&self) -> bool {
        matches!(self, EduConnectSDKError::Transient(_))
    }

    /// 判断是否为冲突错误
    pub fn is_conflict(&self) -> bool {
        matches!(self, EduConnectSDKError::Conflict { .. })
    }

    /// 判断是否为校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, EduConnectSDKError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, EduConnectSDKError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display_includes_code() {
        let err = EduConnectSDKError::conflict_with_code("duplicate key", "23505");
        assert_eq!(err.to_string(), "Conflict [23505]: duplicate key");
        assert!(err.is_conflict());
        assert!(!err.is_transient());
    }

    #[test]
    fn serde_error_maps_to_serialization() {
        let bad: std::result::Result<u64, _> = serde_json::from_str("not json");
        let err: EduConnectSDKError = bad.unwrap_err().into();
        assert!(matches!(err, EduConnectSDKError::Serialization(_)));
    }
}
