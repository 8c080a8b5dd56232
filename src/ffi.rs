//! 原生 ABI 定义层
//!
//! 说明：与 wlroots / libwayland-server 头文件保持布局一致的 `#[repr(C)]` 类型，
//! 以及 `wayland-server-core.h` 中 `wl_list` / `wl_signal` 的辅助函数。
//! 三种回调形状的函数指针类型也集中定义在这里。

#![allow(non_camel_case_types)]

use std::ptr;

use libc::{c_char, c_int, c_uint, c_void};

// wlroots 的 `enum wlr_log_importance`
pub type wlr_log_importance = c_uint;

pub const WLR_SILENT: wlr_log_importance = 0;
pub const WLR_ERROR: wlr_log_importance = 1;
pub const WLR_INFO: wlr_log_importance = 2;
pub const WLR_DEBUG: wlr_log_importance = 3;
pub const WLR_LOG_IMPORTANCE_LAST: wlr_log_importance = 4;

/// 日志回调：原生侧已完成格式化，只传入 (级别, 消息指针)。
pub type wlr_log_func_t = unsafe extern "C" fn(importance: wlr_log_importance, msg: *const c_char);

/// 不透明的 `struct wlr_surface`。
#[repr(C)]
pub struct wlr_surface {
    _private: [u8; 0],
}

/// 表面树遍历回调：(表面, sx, sy, 用户数据)。
pub type wlr_surface_iterator_func_t =
    unsafe extern "C" fn(surface: *mut wlr_surface, sx: c_int, sy: c_int, data: *mut c_void);

// 双向循环链表节点
#[repr(C)]
pub struct wl_list {
    pub prev: *mut wl_list,
    pub next: *mut wl_list,
}

pub type wl_notify_func_t = Option<unsafe extern "C" fn(listener: *mut wl_listener, data: *mut c_void)>;

/// 监听器记录。`link` 必须是第一个字段：信号遍历时由链表节点地址直接还原监听器地址。
#[repr(C)]
pub struct wl_listener {
    pub link: wl_list,
    pub notify: wl_notify_func_t,
}

#[repr(C)]
pub struct wl_signal {
    pub listener_list: wl_list,
}

impl wl_list {
    pub const fn zeroed() -> Self {
        Self {
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        }
    }
}

impl wl_listener {
    // 未绑定状态：链表指针为空，notify 为空
    pub const fn zeroed() -> Self {
        Self {
            link: wl_list::zeroed(),
            notify: None,
        }
    }
}

impl wl_signal {
    pub const fn zeroed() -> Self {
        Self {
            listener_list: wl_list::zeroed(),
        }
    }
}

/// # Safety
///
/// `list` 必须指向有效且可写的 `wl_list`。
pub unsafe fn wl_list_init(list: *mut wl_list) {
    (*list).prev = list;
    (*list).next = list;
}

/// 在 `list` 之后插入 `elm`。
///
/// # Safety
///
/// 两个指针都必须有效；`list` 已初始化，`elm` 不在任何链表中。
pub unsafe fn wl_list_insert(list: *mut wl_list, elm: *mut wl_list) {
    (*elm).prev = list;
    (*elm).next = (*list).next;
    (*list).next = elm;
    (*(*elm).next).prev = elm;
}

/// 从所在链表移除 `elm`，并把它的指针清空（与 libwayland 行为一致）。
///
/// # Safety
///
/// `elm` 必须当前位于某个有效链表中。
pub unsafe fn wl_list_remove(elm: *mut wl_list) {
    (*(*elm).prev).next = (*elm).next;
    (*(*elm).next).prev = (*elm).prev;
    (*elm).next = ptr::null_mut();
    (*elm).prev = ptr::null_mut();
}

/// # Safety
///
/// `list` 必须是已初始化的链表头。
pub unsafe fn wl_list_empty(list: *const wl_list) -> bool {
    ptr::eq((*list).next, list)
}

/// # Safety
///
/// `list` 必须是已初始化的链表头。
pub unsafe fn wl_list_length(list: *const wl_list) -> usize {
    let mut count = 0;
    let mut e = (*list).next as *const wl_list;
    while !ptr::eq(e, list) {
        count += 1;
        e = (*e).next;
    }
    count
}

/// # Safety
///
/// `signal` 必须指向有效且可写的 `wl_signal`。
pub unsafe fn wl_signal_init(signal: *mut wl_signal) {
    wl_list_init(ptr::addr_of_mut!((*signal).listener_list));
}

/// 把监听器追加到信号的监听链表尾部。
///
/// # Safety
///
/// `signal` 已初始化；`listener` 有效且不在任何链表中，并在移除前保持存活。
pub unsafe fn wl_signal_add(signal: *mut wl_signal, listener: *mut wl_listener) {
    wl_list_insert(
        (*signal).listener_list.prev,
        ptr::addr_of_mut!((*listener).link),
    );
}

/// 依次调用所有监听器的 notify。
///
/// 与 `wl_list_for_each_safe` 相同：调用前先取下一个节点，
/// 因此监听器可以在回调中把自己移除。
///
/// # Safety
///
/// `signal` 已初始化，链表上所有监听器都有效。
pub unsafe fn wl_signal_emit(signal: *mut wl_signal, data: *mut c_void) {
    let head = ptr::addr_of_mut!((*signal).listener_list);
    let mut pos = (*head).next;
    while pos != head {
        let next = (*pos).next;
        // link 是 wl_listener 的首个字段（repr(C)），地址相同
        let listener = pos.cast::<wl_listener>();
        if let Some(notify) = (*listener).notify {
            notify(listener, data);
        }
        pos = next;
    }
}
