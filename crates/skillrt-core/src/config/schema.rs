//! 按领域分组的配置结构体
//!
//! 从环境变量加载，统一 fallback 逻辑。测试与嵌入方可直接构造，不依赖进程环境。

use super::env_keys::{observability as obv_keys, paths as path_keys, timeouts as timeout_keys};
use super::loader::{env_bool, env_optional, env_or, env_u64};
use std::path::PathBuf;
use std::time::Duration;

/// Host platform, decides interpreter layout and bootstrap candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    /// Platform of the running binary.
    pub fn host() -> Self {
        Self::parse(std::env::consts::OS)
    }

    /// Parse an OS identifier (`windows`, `win32`, `macos`, `darwin`, `linux`, ...).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "windows" | "win32" | "win" => Self::Windows,
            "macos" | "darwin" | "mac" => Self::MacOs,
            "linux" => Self::Linux,
            _ => Self::Other,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Self::Windows)
    }
}

/// 子进程超时配置
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// `pip install` (default 900s)
    pub install: Duration,
    /// probes, `pip check`, `pip list`, `pip uninstall` (default 120s)
    pub command: Duration,
    /// `python -m venv` and `ensurepip` (default 300s)
    pub venv: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            install: Duration::from_secs(900),
            command: Duration::from_secs(120),
            venv: Duration::from_secs(300),
        }
    }
}

impl Timeouts {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            install: Duration::from_secs(env_u64(
                timeout_keys::SKILLRT_INSTALL_TIMEOUT_SECS,
                &[],
                d.install.as_secs(),
            )),
            command: Duration::from_secs(env_u64(
                timeout_keys::SKILLRT_COMMAND_TIMEOUT_SECS,
                &[],
                d.command.as_secs(),
            )),
            venv: Duration::from_secs(env_u64(
                timeout_keys::SKILLRT_VENV_TIMEOUT_SECS,
                &[],
                d.venv.as_secs(),
            )),
        }
    }
}

/// 托管运行时配置：数据目录、解释器引导命令、平台、超时
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_root: PathBuf,
    /// Whitespace-separated bootstrap command; when set it replaces the platform candidates.
    pub bootstrap_override: Option<String>,
    pub platform: Platform,
    pub timeouts: Timeouts,
}

impl RuntimeConfig {
    /// 从环境变量加载（会自动加载 .env）
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let data_root = env_optional(path_keys::SKILLRT_DATA_DIR, path_keys::DATA_DIR_ALIASES)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_root);
        let platform = env_optional(path_keys::SKILLRT_PLATFORM, &[])
            .map(|s| Platform::parse(&s))
            .unwrap_or_else(Platform::host);
        Self {
            data_root,
            bootstrap_override: env_optional(path_keys::SKILLRT_PYTHON_BOOTSTRAP, &[]),
            platform,
            timeouts: Timeouts::from_env(),
        }
    }

    /// Config rooted at `data_root` with host platform and default timeouts.
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            bootstrap_override: None,
            platform: Platform::host(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn settings_file(&self) -> PathBuf {
        self.data_root.join("settings.json")
    }

    pub fn skills_file(&self) -> PathBuf {
        self.data_root.join("skills.json")
    }
}

fn default_data_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".skillrt"))
        .unwrap_or_else(|| PathBuf::from(".").join(".skillrt"))
}

/// 可观测性配置：quiet、log_level、log_json、audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::SKILLRT_QUIET, &[], false),
                log_level: env_or(obv_keys::SKILLRT_LOG_LEVEL, &[], || "skillrt=info".to_string()),
                log_json: env_bool(obv_keys::SKILLRT_LOG_JSON, &[], false),
                audit_log: env_optional(obv_keys::SKILLRT_AUDIT_LOG, &[]),
            }
        })
    }
}
