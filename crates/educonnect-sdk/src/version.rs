//! SDK 版本元信息
//!
//! 版本号唯一权威源是 Cargo.toml，禁止手写，
//! 必须用 `env!("CARGO_PKG_VERSION")` 保持同步。

/// SDK semver，来自 Cargo.toml
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
