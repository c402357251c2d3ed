//! skillrt 统一配置层
//!
//! 所有环境变量读取集中在此模块，业务代码通过结构化配置访问，避免直接 `std::env::var`。
//!
//! - `loader`：env_or、env_optional、env_bool、env_u64 等辅助函数
//! - `schema`：RuntimeConfig、ObservabilityConfig、Platform
//! - `env_keys`：key 常量

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, env_u64, load_dotenv, load_dotenv_from_dir};
pub use schema::{ObservabilityConfig, Platform, RuntimeConfig, Timeouts};
