//! 实用工具模块
//!
//! - ID 生成（绑定 ID、headless 表面 ID）
//! - 版本字符串
//! - panic 载荷转文本（trampoline 吞掉 panic 时用于日志）

use std::any::Any;

use git_version::git_version;

pub mod id;

/// 版本字符串，优先使用构建时注入的值；否则为包版本加 Git 提交。
pub fn version() -> String {
    if let Some(v) = option_env!("WLR_TRAMPOLINE_BUILD_VERSION_STRING") {
        return String::from(v);
    }

    const MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
    const MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
    const PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");

    let commit = option_env!("WLR_TRAMPOLINE_BUILD_COMMIT")
        .unwrap_or(git_version!(fallback = "unknown commit"));

    format!("{MAJOR}.{MINOR}.{PATCH} ({commit})")
}

/// 从 `catch_unwind` 得到的载荷中取出可读消息。
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use std::panic;

    use super::*;

    #[test]
    fn panic_message_from_str_and_string() {
        let payload = panic::catch_unwind(|| panic!("plain")).unwrap_err();
        assert_eq!(panic_message(&*payload), "plain");

        let n = 3;
        let payload = panic::catch_unwind(|| panic!("formatted {n}")).unwrap_err();
        assert_eq!(panic_message(&*payload), "formatted 3");

        let payload = panic::catch_unwind(|| panic::panic_any(7u32)).unwrap_err();
        assert_eq!(panic_message(&*payload), "<non-string panic payload>");
    }

    #[test]
    fn version_carries_commit() {
        let v = version();
        if option_env!("WLR_TRAMPOLINE_BUILD_VERSION_STRING").is_none() {
            let (number, commit) = v.split_once(' ').unwrap();
            assert_eq!(number, env!("CARGO_PKG_VERSION"));
            assert!(commit.starts_with('(') && commit.ends_with(')'), "{v}");
        }
    }
}
