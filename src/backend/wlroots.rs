//! 系统 wlroots 后端：直接调用 libwlroots 的导出符号。
//!
//! 日志回调经过 `shim/wlr_log_shim.c`：wlroots 传入的是 `va_list`，
//! 垫片先 `vasprintf` 再以 `(importance, msg)` 调用 Rust 侧 trampoline。

use std::ffi::CStr;

use libc::{c_char, c_void};

use crate::ffi::{wlr_log_func_t, wlr_log_importance, wlr_surface, wlr_surface_iterator_func_t};
use crate::log::LogImportance;

extern "C" {
    fn wlr_trampoline_log_init(verbosity: wlr_log_importance, callback: Option<wlr_log_func_t>);

    fn _wlr_log(verbosity: wlr_log_importance, fmt: *const c_char, ...);

    fn wlr_surface_for_each_surface(
        surface: *mut wlr_surface,
        iterator: wlr_surface_iterator_func_t,
        user_data: *mut c_void,
    );
}

#[derive(Debug, Default)]
pub struct Wlroots;

impl Wlroots {
    pub fn new() -> Self {
        Self
    }

    pub fn log_init(&self, verbosity: LogImportance, callback: Option<wlr_log_func_t>) {
        unsafe { wlr_trampoline_log_init(verbosity.to_raw(), callback) }
    }

    pub fn log_emit(&self, importance: LogImportance, msg: &CStr) {
        // 消息作为 "%s" 的参数传入，避免其中的 % 被再次解释
        unsafe { _wlr_log(importance.to_raw(), c"%s".as_ptr(), msg.as_ptr()) }
    }

    /// # Safety
    ///
    /// `root` 必须是存活的 `wlr_surface`。
    pub unsafe fn for_each_surface(
        &self,
        root: *mut wlr_surface,
        iterator: wlr_surface_iterator_func_t,
        data: *mut c_void,
    ) {
        wlr_surface_for_each_surface(root, iterator, data)
    }
}
