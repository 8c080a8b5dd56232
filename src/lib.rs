/// lib.rs - wlroots 回调 trampoline 库的根模块
///
/// 原生库要求固定签名的 C 函数指针作为回调。本库为三种回调形状各提供一个
/// 固定入口，并把调用转发给宿主侧动态选择的处理函数：
///   - log:      日志汇（进程级唯一处理函数）
///   - surface:  表面树逐节点遍历
///   - listener: `wl_listener` 通知槽位 + 登记表

#[macro_use]
extern crate tracing;

/// 原生库后端（系统 wlroots / 进程内 headless 模型）
pub mod backend;

/// 命令行参数
pub mod cli;

/// JSON 配置
pub mod config;

/// headless 上的演示流程
pub mod demo;

/// 原生 ABI 类型与 wl_list / wl_signal 辅助函数
pub mod ffi;

pub mod listener;
pub mod log;
pub mod surface;

/// 工具函数
pub mod utils;

#[cfg(test)]
mod tests;
