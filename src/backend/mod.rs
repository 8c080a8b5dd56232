//! 作用：原生库抽象层
//! 说明：trampoline 本身只是固定签名的 `extern "C"` 函数；真正调用它们的是原生库。
//! 这里统一原生侧的三个入口，支持两种实现：
//!   - Wlroots: 链接系统 wlroots（`system-wlroots` 特性）
//!   - Headless: 进程内模型（测试与 demo 使用）

use std::ffi::CStr;

use libc::c_void;

use crate::ffi::{wlr_log_func_t, wlr_surface, wlr_surface_iterator_func_t};
use crate::log::LogImportance;

pub mod headless;
pub use headless::Headless;

#[cfg(feature = "system-wlroots")]
pub mod wlroots;
#[cfg(feature = "system-wlroots")]
pub use wlroots::Wlroots;

// 枚举：原生后端
pub enum Backend {
    #[cfg(feature = "system-wlroots")]
    Wlroots(Wlroots),
    Headless(Headless),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "system-wlroots")]
            Backend::Wlroots(_) => "wlroots",
            Backend::Headless(_) => "headless",
        }
    }

    /// 原生 `wlr_log_init`：设置阈值并安装（或移除）日志回调。
    pub fn log_init(&self, verbosity: LogImportance, callback: Option<wlr_log_func_t>) {
        match self {
            #[cfg(feature = "system-wlroots")]
            Backend::Wlroots(wlroots) => wlroots.log_init(verbosity, callback),
            Backend::Headless(headless) => headless.log_init(verbosity, callback),
        }
    }

    /// 原生日志发射点（`_wlr_log`），由原生侧决定是否过滤、交给谁。
    pub fn log_emit(&self, importance: LogImportance, msg: &CStr) {
        match self {
            #[cfg(feature = "system-wlroots")]
            Backend::Wlroots(wlroots) => wlroots.log_emit(importance, msg),
            Backend::Headless(headless) => headless.log_emit(importance, msg),
        }
    }

    /// 原生 `wlr_surface_for_each_surface`。
    ///
    /// # Safety
    ///
    /// `root` 必须是该后端的有效表面；`iterator` 必须能正确解释 `data`。
    pub unsafe fn for_each_surface(
        &self,
        root: *mut wlr_surface,
        iterator: wlr_surface_iterator_func_t,
        data: *mut c_void,
    ) {
        match self {
            #[cfg(feature = "system-wlroots")]
            Backend::Wlroots(wlroots) => wlroots.for_each_surface(root, iterator, data),
            Backend::Headless(headless) => headless.for_each_surface(root, iterator, data),
        }
    }

    pub fn headless(&self) -> Option<&Headless> {
        match self {
            Backend::Headless(headless) => Some(headless),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Headless(Headless::new())
    }
}
