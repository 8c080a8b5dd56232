//! 监听器绑定 trampoline
//!
//! 所有绑定过的 `wl_listener` 共用同一个 notify 入口 `notify_trampoline`。
//! 触发时仅凭记录地址找回宿主侧处理对象，因此用一张显式的登记表保存
//! “记录地址 → 处理对象”，绑定时写入、解绑时删除，不在原生内存里放反向指针。
//!
//! 单条记录的状态机：
//!
//! ```text
//! Unbound ──bind──> Bound ──register──> Registered ──(触发 *)──> unbind ──> Unbound
//!                     └──────────────────unbind────────────────────────────────┘
//! ```
//!
//! 约定：
//! - 同一记录重复绑定被拒绝（`BindError::AlreadyBound`），原绑定保持不变；
//! - 绑定后 notify 槽位不得被宿主改写，注册与解绑时都会检查；
//! - 登记表按线程划分：原生库在绑定所在的线程上投递事件；
//! - 本层不拥有任何记录的内存，`unbind` 之后由分配方释放。

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::ptr::{self, NonNull};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use libc::c_void;
use serde::{Deserialize, Serialize};

use crate::ffi::{self, wl_listener, wl_signal};
use crate::utils::id::IdCounter;
use crate::utils::panic_message;

static BINDING_ID_COUNTER: IdCounter = IdCounter::new();

/// 宿主侧处理对象，登记表中保存的分发目标。
pub trait ListenerHandler {
    fn notify(&mut self, record: NonNull<wl_listener>, data: *mut c_void);
}

impl<F> ListenerHandler for F
where
    F: FnMut(*mut c_void),
{
    fn notify(&mut self, _record: NonNull<wl_listener>, data: *mut c_void) {
        self(data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

impl BindingId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Unbound,
    Bound,
    Registered,
}

/// 原生库触发了未绑定记录时的处理方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnboundPolicy {
    /// 记录错误后中止进程。
    #[default]
    Abort,
    LogAndIgnore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindError {
    AlreadyBound(BindingId),
    NotBound,
    AlreadyRegistered(BindingId),
    SlotReassigned(BindingId),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindError::AlreadyBound(id) => write!(f, "listener record is already bound ({id})"),
            BindError::NotBound => write!(f, "listener record is not bound"),
            BindError::AlreadyRegistered(id) => {
                write!(f, "listener record is already registered ({id})")
            }
            BindError::SlotReassigned(id) => {
                write!(f, "notify slot of {id} no longer points at the trampoline")
            }
        }
    }
}

impl std::error::Error for BindError {}

struct Binding {
    id: BindingId,
    registered: bool,
    handler: Rc<RefCell<dyn ListenerHandler>>,
}

thread_local! {
    // 键为记录地址
    static REGISTRY: RefCell<HashMap<usize, Binding>> = RefCell::new(HashMap::new());
}

// false = Abort, true = LogAndIgnore
static IGNORE_UNBOUND: AtomicBool = AtomicBool::new(false);
static UNBOUND_FIRES: AtomicU64 = AtomicU64::new(0);

pub fn set_unbound_policy(policy: UnboundPolicy) {
    IGNORE_UNBOUND.store(policy == UnboundPolicy::LogAndIgnore, Ordering::Relaxed);
}

pub fn unbound_policy() -> UnboundPolicy {
    if IGNORE_UNBOUND.load(Ordering::Relaxed) {
        UnboundPolicy::LogAndIgnore
    } else {
        UnboundPolicy::Abort
    }
}

/// 进程启动以来未绑定触发的次数（仅在 `LogAndIgnore` 下能继续累加）。
pub fn unbound_fire_count() -> u64 {
    UNBOUND_FIRES.load(Ordering::Relaxed)
}

fn key(record: NonNull<wl_listener>) -> usize {
    record.as_ptr() as usize
}

unsafe fn slot_intact(record: NonNull<wl_listener>) -> bool {
    let trampoline: unsafe extern "C" fn(*mut wl_listener, *mut c_void) = notify_trampoline;
    (*record.as_ptr()).notify.map(|f| f as usize) == Some(trampoline as usize)
}

/// 把 `record` 的 notify 设为固定入口，并登记其处理对象。
///
/// 必须在记录注册到任何信号之前调用，且只调用一次。
///
/// # Safety
///
/// `record` 指向可写的 `wl_listener`，在 `unbind` 之前保持存活且地址不变。
pub unsafe fn bind<H>(record: NonNull<wl_listener>, handler: H) -> Result<BindingId, BindError>
where
    H: ListenerHandler + 'static,
{
    let existing = REGISTRY.with(|registry| registry.borrow().get(&key(record)).map(|b| b.id));
    if let Some(id) = existing {
        return Err(BindError::AlreadyBound(id));
    }

    (*record.as_ptr()).notify = Some(notify_trampoline);

    let id = BindingId(BINDING_ID_COUNTER.next());
    let binding = Binding {
        id,
        registered: false,
        handler: Rc::new(RefCell::new(handler)),
    };
    REGISTRY.with(|registry| registry.borrow_mut().insert(key(record), binding));

    trace!("bound listener {:p} as {id}", record.as_ptr());
    Ok(id)
}

/// 把已绑定的记录加入信号（`wl_signal_add`）。
///
/// # Safety
///
/// `signal` 指向已初始化的 `wl_signal`，并在记录注册期间保持存活。
pub unsafe fn register(
    record: NonNull<wl_listener>,
    signal: NonNull<wl_signal>,
) -> Result<BindingId, BindError> {
    REGISTRY.with(|registry| {
        let mut registry = registry.borrow_mut();
        let binding = registry.get_mut(&key(record)).ok_or(BindError::NotBound)?;
        if binding.registered {
            return Err(BindError::AlreadyRegistered(binding.id));
        }
        if !slot_intact(record) {
            return Err(BindError::SlotReassigned(binding.id));
        }

        ffi::wl_signal_add(signal.as_ptr(), record.as_ptr());
        binding.registered = true;
        Ok(binding.id)
    })
}

/// 从信号上摘下记录（若已注册）并删除登记。之后分配方可以释放记录。
///
/// notify 槽位保持指向 trampoline：之后若原生侧仍触发该记录，会按未绑定处理。
///
/// # Safety
///
/// `record` 仍然存活；若已注册且链接未被摘下，其所在信号也仍然存活。
pub unsafe fn unbind(record: NonNull<wl_listener>) -> Result<BindingId, BindError> {
    let binding = REGISTRY
        .with(|registry| registry.borrow_mut().remove(&key(record)))
        .ok_or(BindError::NotBound)?;

    // 外部已经 wl_list_remove 过的链接两端为空，不能再摘一次
    let link = ptr::addr_of_mut!((*record.as_ptr()).link);
    if binding.registered && !(*link).prev.is_null() {
        ffi::wl_list_remove(link);
    }
    if !slot_intact(record) {
        warn!("{} notify slot was reassigned while bound", binding.id);
    }

    trace!("unbound listener {:p} ({})", record.as_ptr(), binding.id);
    // 处理对象在登记表借用结束之后才析构，析构中可以继续解绑别的记录
    Ok(binding.id)
}

pub fn state(record: NonNull<wl_listener>) -> ListenerState {
    REGISTRY.with(|registry| match registry.borrow().get(&key(record)) {
        None => ListenerState::Unbound,
        Some(binding) if binding.registered => ListenerState::Registered,
        Some(_) => ListenerState::Bound,
    })
}

pub fn binding_id(record: NonNull<wl_listener>) -> Option<BindingId> {
    REGISTRY.with(|registry| registry.borrow().get(&key(record)).map(|b| b.id))
}

fn unbound_fired(listener: *mut wl_listener) {
    UNBOUND_FIRES.fetch_add(1, Ordering::Relaxed);
    match unbound_policy() {
        UnboundPolicy::Abort => {
            error!("native library fired unbound listener {listener:p}, aborting");
            process::abort();
        }
        UnboundPolicy::LogAndIgnore => {
            error!("native library fired unbound listener {listener:p}, ignoring");
        }
    }
}

/// 所有绑定记录共用的 notify 入口。
///
/// # Safety
///
/// 只应由原生库（或其替身）通过记录的 notify 槽位调用。
pub unsafe extern "C" fn notify_trampoline(listener: *mut wl_listener, data: *mut c_void) {
    let Some(record) = NonNull::new(listener) else {
        unbound_fired(listener);
        return;
    };

    let target = REGISTRY.with(|registry| {
        registry
            .borrow()
            .get(&key(record))
            .map(|b| (b.id, b.handler.clone()))
    });
    let Some((id, handler)) = target else {
        unbound_fired(listener);
        return;
    };

    let Ok(mut handler) = handler.try_borrow_mut() else {
        error!("{id} fired while its handler is still running, dropping nested notification");
        return;
    };

    let res = panic::catch_unwind(AssertUnwindSafe(|| handler.notify(record, data)));
    if let Err(payload) = res {
        // 处理对象状态已不可信，且 panic 不能穿过原生栈帧
        error!("{id} handler panicked: {}", panic_message(&*payload));
        process::abort();
    }
}

/// 宿主分配的监听器记录：创建时绑定，析构时解绑并释放。
pub struct Listener {
    record: NonNull<wl_listener>,
    id: BindingId,
}

impl Listener {
    pub fn new<H>(handler: H) -> Result<Self, BindError>
    where
        H: ListenerHandler + 'static,
    {
        let record = NonNull::from(Box::leak(Box::new(wl_listener::zeroed())));
        match unsafe { bind(record, handler) } {
            Ok(id) => Ok(Self { record, id }),
            Err(err) => {
                // 同地址残留的登记（释放后未解绑的旧记录）
                drop(unsafe { Box::from_raw(record.as_ptr()) });
                Err(err)
            }
        }
    }

    /// # Safety
    ///
    /// `signal` 指向已初始化的 `wl_signal`，且比本监听器活得更久。
    pub unsafe fn connect(&self, signal: NonNull<wl_signal>) -> Result<(), BindError> {
        register(self.record, signal).map(drop)
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    pub fn as_ptr(&self) -> *mut wl_listener {
        self.record.as_ptr()
    }

    pub fn state(&self) -> ListenerState {
        state(self.record)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("record", &self.record)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        unsafe {
            if let Err(err) = unbind(self.record) {
                warn!("error unbinding {}: {err}", self.id);
            }
            drop(Box::from_raw(self.record.as_ptr()));
        }
    }
}
