//! Environment lookup helpers shared by every `from_env` constructor.
//!
//! A key is read as `primary`, then each alias in order. Empty values count as unset.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Once;

/// Load `./.env` once per process. Variables already set win.
pub fn load_dotenv() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// Load `<dir>/.env` without overriding existing variables.
pub fn load_dotenv_from_dir(dir: &Path) {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if env::var_os(&key).is_none() {
            #[allow(unsafe_code)]
            unsafe {
                env::set_var(&key, &value);
            }
        }
    }
}

/// `KEY=value` lines. Blank lines, `#` comments and lines without `=` are skipped;
/// one level of matching quotes is stripped and an unquoted trailing `# ...` dropped.
fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .filter_map(|(k, v)| {
            let key = k.trim();
            (!key.is_empty()).then(|| (key.to_string(), dotenv_value(v.trim())))
        })
        .collect()
}

fn dotenv_value(raw: &str) -> String {
    for q in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(q) && raw.ends_with(q) {
            return raw[1..raw.len() - 1].to_string();
        }
    }
    match raw.split_once(" #") {
        Some((value, _)) if !value.contains(['"', '\'']) => value.trim_end().to_string(),
        _ => raw.to_string(),
    }
}

fn lookup(primary: &str, aliases: &[&str]) -> Option<String> {
    std::iter::once(primary)
        .chain(aliases.iter().copied())
        .filter_map(|k| env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// 主变量或别名链，未设置时取默认值
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    lookup(primary, aliases).unwrap_or_else(default)
}

pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    lookup(primary, aliases)
}

/// `0`, `false`, `no` and `off` (any case) are false; any other value is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    lookup(primary, aliases)
        .map(|s| !matches!(s.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
        .unwrap_or(default)
}

/// Positive integer; zero or garbage falls back to `default`.
pub fn env_u64(primary: &str, aliases: &[&str], default: u64) -> u64 {
    lookup(primary, aliases)
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
