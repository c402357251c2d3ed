//! 环境变量 key 常量定义
//!
//! 所有变量统一使用 `SKILLRT_*` 前缀。

/// 数据目录与托管运行时
pub mod paths {
    /// Data root override. Default: `~/.skillrt`.
    pub const SKILLRT_DATA_DIR: &str = "SKILLRT_DATA_DIR";
    pub const DATA_DIR_ALIASES: &[&str] = &["SKILLRT_HOME"];

    /// Interpreter bootstrap command, e.g. `python3.11` or `py -3.12`.
    pub const SKILLRT_PYTHON_BOOTSTRAP: &str = "SKILLRT_PYTHON_BOOTSTRAP";

    /// Host platform override: `windows`, `macos`, `linux`.
    pub const SKILLRT_PLATFORM: &str = "SKILLRT_PLATFORM";
}

/// 子进程超时（秒）
pub mod timeouts {
    pub const SKILLRT_INSTALL_TIMEOUT_SECS: &str = "SKILLRT_INSTALL_TIMEOUT_SECS";
    pub const SKILLRT_COMMAND_TIMEOUT_SECS: &str = "SKILLRT_COMMAND_TIMEOUT_SECS";
    pub const SKILLRT_VENV_TIMEOUT_SECS: &str = "SKILLRT_VENV_TIMEOUT_SECS";
}

/// 可观测性与日志
pub mod observability {
    pub const SKILLRT_QUIET: &str = "SKILLRT_QUIET";
    pub const SKILLRT_LOG_LEVEL: &str = "SKILLRT_LOG_LEVEL";
    pub const SKILLRT_LOG_JSON: &str = "SKILLRT_LOG_JSON";
    pub const SKILLRT_AUDIT_LOG: &str = "SKILLRT_AUDIT_LOG";
}
