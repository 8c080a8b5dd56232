//! 日志汇 trampoline
//!
//! 原生库的日志回调是进程级的单一槽位，这里用一个受锁保护的全局槽位与之对应：
//!
//! ```text
//! 原生 _wlr_log ──> (原生格式化) ──> log_trampoline(importance, msg)
//!                                        │ 复制为 String
//!                                        v
//!                                  SINK 中的当前处理函数
//! ```
//!
//! 约定：
//! - `configure_logging` 整体替换处理函数与阈值，不累积；
//! - 传入 `None` 时原生库回到自身的默认输出；
//! - 消息无法还原（空指针、未知级别）时静默丢弃，处理函数 panic 也不会穿过 FFI 边界。

use std::ffi::{CStr, CString};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use libc::c_char;
use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::ffi::{self, wlr_log_importance};
use crate::utils::panic_message;

/// 日志级别，数值与 `enum wlr_log_importance` 相同。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum LogImportance {
    Silent = ffi::WLR_SILENT,
    Error = ffi::WLR_ERROR,
    Info = ffi::WLR_INFO,
    Debug = ffi::WLR_DEBUG,
}

impl LogImportance {
    pub fn from_raw(raw: wlr_log_importance) -> Option<Self> {
        match raw {
            ffi::WLR_SILENT => Some(Self::Silent),
            ffi::WLR_ERROR => Some(Self::Error),
            ffi::WLR_INFO => Some(Self::Info),
            ffi::WLR_DEBUG => Some(Self::Debug),
            _ => None,
        }
    }

    pub fn to_raw(self) -> wlr_log_importance {
        self as wlr_log_importance
    }

    /// 以 `self` 为阈值时，`importance` 级别的消息是否应输出。
    pub fn allows(self, importance: LogImportance) -> bool {
        importance != LogImportance::Silent && importance <= self
    }
}

pub type LogHandler = Arc<dyn Fn(LogImportance, &str) + Send + Sync>;

struct LogSink {
    verbosity: LogImportance,
    handler: LogHandler,
}

// 进程级唯一的日志处理槽位
static SINK: RwLock<Option<LogSink>> = RwLock::new(None);

/// 单条日志，只在一次转发期间存在。
struct LogRecord {
    importance: LogImportance,
    message: String,
}

#[derive(Debug)]
enum FormatError {
    NullMessage,
    UnknownImportance(wlr_log_importance),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::NullMessage => write!(f, "null message pointer"),
            FormatError::UnknownImportance(raw) => write!(f, "unknown log importance {raw}"),
        }
    }
}

impl LogRecord {
    /// # Safety
    ///
    /// `msg` 为空或指向以 NUL 结尾的有效字符串。
    unsafe fn materialize(
        importance: wlr_log_importance,
        msg: *const c_char,
    ) -> Result<Self, FormatError> {
        let importance =
            LogImportance::from_raw(importance).ok_or(FormatError::UnknownImportance(importance))?;
        if msg.is_null() {
            return Err(FormatError::NullMessage);
        }

        // 原生缓冲区在回调返回后即失效，必须在此处复制
        let message = CStr::from_ptr(msg).to_string_lossy().into_owned();
        Ok(Self { importance, message })
    }
}

/// 安装（`Some`）或移除（`None`）进程级日志处理函数。
///
/// 后一次调用完全覆盖前一次的处理函数与阈值。调用方需保证重新配置
/// 不与原生侧的并发日志输出交错。
pub fn configure_logging(backend: &Backend, verbosity: LogImportance, handler: Option<LogHandler>) {
    match handler {
        Some(handler) => {
            // 先填槽位再安装回调：回调一旦可达，槽位必然有值
            *SINK.write().unwrap_or_else(PoisonError::into_inner) =
                Some(LogSink { verbosity, handler });
            backend.log_init(verbosity, Some(log_trampoline));
            debug!("forwarding {} log at {verbosity:?}", backend.name());
        }
        None => {
            backend.log_init(verbosity, None);
            SINK.write().unwrap_or_else(PoisonError::into_inner).take();
            debug!("{} log reverted to native default", backend.name());
        }
    }
}

/// 当前生效的阈值；未转发时为 `None`。
pub fn forwarding_verbosity() -> Option<LogImportance> {
    SINK.read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|sink| sink.verbosity)
}

fn active_sink() -> Option<(LogImportance, LogHandler)> {
    SINK.read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
        .map(|sink| (sink.verbosity, sink.handler.clone()))
}

/// 安装到原生库的日志回调。
///
/// # Safety
///
/// 只应由原生库调用；`msg` 为空或指向以 NUL 结尾的字符串。
pub unsafe extern "C" fn log_trampoline(importance: wlr_log_importance, msg: *const c_char) {
    let record = match LogRecord::materialize(importance, msg) {
        Ok(record) => record,
        Err(err) => {
            trace!("dropping native log message: {err}");
            return;
        }
    };

    // 读锁只持有到克隆出处理函数为止，处理函数内部可以重新配置
    let Some((verbosity, handler)) = active_sink() else {
        return;
    };
    // wlroots 只在内置 stderr 输出里过滤，自定义回调收到全部消息
    if !verbosity.allows(record.importance) {
        return;
    }

    let res = panic::catch_unwind(AssertUnwindSafe(|| {
        handler(record.importance, &record.message)
    }));
    if let Err(payload) = res {
        warn!(
            "log handler panicked, message dropped: {}",
            panic_message(&*payload)
        );
    }
}

/// 通过原生日志发出一条宿主侧消息，走与原生消息相同的路径。
///
/// 消息在第一个 NUL 处截断。
pub fn log(backend: &Backend, importance: LogImportance, args: fmt::Arguments<'_>) {
    let mut text = args.to_string();
    if let Some(nul) = text.find('\0') {
        text.truncate(nul);
    }

    match CString::new(text) {
        Ok(msg) => backend.log_emit(importance, &msg),
        Err(err) => trace!("dropping host log message: {err}"),
    }
}

/// 带 `[文件:行号]` 前缀的宿主侧日志。
#[macro_export]
macro_rules! wlr_log {
    ($backend:expr, $importance:expr, $($arg:tt)+) => {
        $crate::log::log(
            $backend,
            $importance,
            format_args!("[{}:{}] {}", file!(), line!(), format_args!($($arg)+)),
        )
    };
}

/// 把原生日志转成 `wlroots` 目标下的 tracing 事件。
pub fn tracing_handler() -> LogHandler {
    Arc::new(|importance: LogImportance, msg: &str| match importance {
        LogImportance::Error => error!(target: "wlroots", "{msg}"),
        LogImportance::Info => info!(target: "wlroots", "{msg}"),
        LogImportance::Debug => debug!(target: "wlroots", "{msg}"),
        LogImportance::Silent => (),
    })
}
