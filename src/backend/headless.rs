//! 作用：无头原生库模型
//! 说明：在进程内模拟 trampoline 需要的那部分 wlroots 行为，用于测试与 demo：
//!   - 日志核心：安装了回调时每条消息都交给回调；未安装时走内置默认输出
//!     （stderr），只有这条路径按阈值过滤
//!   - 表面树：子表面分为 below / above 两组，遍历顺序与 wlroots 一致
//!     （below 子树 → 自身 → above 子树），偏移逐层累加
//! 限制：表面句柄是编码后的 ID，不是真实内存地址

use std::collections::HashMap;
use std::ffi::CStr;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

use libc::c_void;

use crate::ffi::{wlr_log_func_t, wlr_surface, wlr_surface_iterator_func_t};
use crate::log::LogImportance;
use crate::surface::Surface;
use crate::utils::id::IdCounter;

static SURFACE_ID_COUNTER: IdCounter = IdCounter::new();

/// 子表面相对父表面的堆叠位置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Below,
    Above,
}

struct Subsurface {
    id: u64,
    x: i32,
    y: i32,
}

#[derive(Default)]
struct HeadlessSurface {
    below: Vec<Subsurface>,
    above: Vec<Subsurface>,
}

struct HeadlessLog {
    verbosity: LogImportance,
    callback: Option<wlr_log_func_t>,
    // 默认输出（未安装回调时）记录在这里，便于检查“回退到原生默认行为”
    default_output: Vec<(LogImportance, String)>,
}

pub struct Headless {
    log: Mutex<HeadlessLog>,
    surfaces: Mutex<HashMap<u64, HeadlessSurface>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Headless {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(HeadlessLog {
                verbosity: LogImportance::Error,
                callback: None,
                default_output: Vec::new(),
            }),
            surfaces: Mutex::new(HashMap::new()),
        }
    }

    pub fn log_init(&self, verbosity: LogImportance, callback: Option<wlr_log_func_t>) {
        let mut log = lock(&self.log);
        log.verbosity = verbosity;
        log.callback = callback;
    }

    pub fn log_emit(&self, importance: LogImportance, msg: &CStr) {
        let callback = {
            let mut log = lock(&self.log);
            match log.callback {
                Some(callback) => callback,
                None => {
                    // 与 wlroots 一致：只有默认输出按阈值过滤
                    if !log.verbosity.allows(importance) {
                        return;
                    }
                    let text = msg.to_string_lossy().into_owned();
                    eprintln!("[headless] [{importance:?}] {text}");
                    log.default_output.push((importance, text));
                    return;
                }
            }
        };

        // 回调在锁外调用：回调里可能重新配置日志
        unsafe { callback(importance.to_raw(), msg.as_ptr()) }
    }

    /// 取走默认输出记录的所有消息。
    pub fn take_default_log(&self) -> Vec<(LogImportance, String)> {
        std::mem::take(&mut lock(&self.log).default_output)
    }

    pub fn create_surface(&self) -> Surface {
        let id = SURFACE_ID_COUNTER.next();
        lock(&self.surfaces).insert(id, HeadlessSurface::default());
        surface_from_id(id)
    }

    /// 在 `parent` 下创建子表面，`(x, y)` 相对父表面。父表面未知时返回 `None`。
    pub fn add_subsurface(
        &self,
        parent: Surface,
        x: i32,
        y: i32,
        placement: Placement,
    ) -> Option<Surface> {
        let parent_id = id_from_ptr(parent.as_ptr());
        let mut surfaces = lock(&self.surfaces);
        if !surfaces.contains_key(&parent_id) {
            return None;
        }

        let id = SURFACE_ID_COUNTER.next();
        surfaces.insert(id, HeadlessSurface::default());

        let parent = surfaces.get_mut(&parent_id)?;
        let sub = Subsurface { id, x, y };
        match placement {
            Placement::Below => parent.below.push(sub),
            Placement::Above => parent.above.push(sub),
        }

        Some(surface_from_id(id))
    }

    pub fn surface_count(&self) -> usize {
        lock(&self.surfaces).len()
    }

    /// # Safety
    ///
    /// `iterator` 必须能正确解释 `data`。未知的 `root` 不会产生任何回调。
    pub unsafe fn for_each_surface(
        &self,
        root: *mut wlr_surface,
        iterator: wlr_surface_iterator_func_t,
        data: *mut c_void,
    ) {
        // 先在锁内收集访问序列，再在锁外回调：回调里可以继续创建表面
        let visits = {
            let surfaces = lock(&self.surfaces);
            let mut visits = Vec::new();
            collect_visits(&surfaces, id_from_ptr(root), 0, 0, &mut visits);
            visits
        };

        for (id, sx, sy) in visits {
            iterator(id as usize as *mut wlr_surface, sx, sy, data);
        }
    }
}

impl Default for Headless {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_visits(
    surfaces: &HashMap<u64, HeadlessSurface>,
    id: u64,
    sx: i32,
    sy: i32,
    out: &mut Vec<(u64, i32, i32)>,
) {
    let Some(surface) = surfaces.get(&id) else {
        return;
    };

    // 偏移按 C 的 int 语义回绕，不在深层大偏移时 panic
    for sub in &surface.below {
        collect_visits(surfaces, sub.id, sx.wrapping_add(sub.x), sy.wrapping_add(sub.y), out);
    }
    out.push((id, sx, sy));
    for sub in &surface.above {
        collect_visits(surfaces, sub.id, sx.wrapping_add(sub.x), sy.wrapping_add(sub.y), out);
    }
}

fn id_from_ptr(ptr: *mut wlr_surface) -> u64 {
    ptr as usize as u64
}

fn surface_from_id(id: u64) -> Surface {
    // ID 从 1 开始，不会为空
    let ptr = NonNull::new(id as usize as *mut wlr_surface).unwrap_or(NonNull::dangling());
    Surface::from_non_null(ptr)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    unsafe extern "C" fn collect(surface: *mut wlr_surface, sx: i32, sy: i32, data: *mut c_void) {
        let out = &*(data as *const RefCell<Vec<(usize, i32, i32)>>);
        out.borrow_mut().push((surface as usize, sx, sy));
    }

    fn walk(headless: &Headless, root: Surface) -> Vec<(usize, i32, i32)> {
        let out = RefCell::new(Vec::new());
        unsafe {
            headless.for_each_surface(
                root.as_ptr(),
                collect,
                &out as *const _ as *mut c_void,
            );
        }
        out.into_inner()
    }

    #[test]
    fn below_self_above_order_with_accumulated_offsets() {
        let headless = Headless::new();
        let root = headless.create_surface();
        let above = headless.add_subsurface(root, 10, 20, Placement::Above).unwrap();
        let below = headless.add_subsurface(root, -5, 0, Placement::Below).unwrap();
        let nested = headless.add_subsurface(above, 1, 1, Placement::Above).unwrap();

        let visits = walk(&headless, root);
        let ids: Vec<_> = visits.iter().map(|v| v.0).collect();
        assert_eq!(
            ids,
            [below, root, above, nested].map(|s| s.as_ptr() as usize)
        );
        assert_eq!(visits[0].1, -5);
        assert_eq!((visits[3].1, visits[3].2), (11, 21));
    }

    #[test]
    fn unknown_root_visits_nothing() {
        let headless = Headless::new();
        let other = Headless::new();
        let foreign = other.create_surface();
        assert!(walk(&headless, foreign).is_empty());
        assert!(headless.add_subsurface(foreign, 0, 0, Placement::Above).is_none());
    }

    #[test]
    fn large_offsets_do_not_overflow() {
        let headless = Headless::new();
        let root = headless.create_surface();
        let far = headless.add_subsurface(root, i32::MAX, 0, Placement::Above).unwrap();
        headless.add_subsurface(far, 1, -1, Placement::Above).unwrap();

        let offsets: Vec<_> = walk(&headless, root).iter().map(|v| (v.1, v.2)).collect();
        assert_eq!(offsets, [(0, 0), (i32::MAX, 0), (i32::MIN, -1)]);
    }

    unsafe extern "C" fn record_raw(importance: u32, msg: *const libc::c_char) {
        let text = CStr::from_ptr(msg).to_string_lossy().into_owned();
        RAW_SEEN.with(|seen| seen.borrow_mut().push((importance, text)));
    }

    thread_local! {
        static RAW_SEEN: RefCell<Vec<(u32, String)>> = const { RefCell::new(Vec::new()) };
    }

    #[test]
    fn installed_callback_sees_every_importance() {
        let headless = Headless::new();
        headless.log_init(LogImportance::Error, Some(record_raw));

        headless.log_emit(LogImportance::Debug, c"debug");
        headless.log_emit(LogImportance::Error, c"error");

        let seen = RAW_SEEN.with(|seen| seen.take());
        assert_eq!(
            seen,
            vec![
                (LogImportance::Debug.to_raw(), String::from("debug")),
                (LogImportance::Error.to_raw(), String::from("error")),
            ]
        );
        assert!(headless.take_default_log().is_empty());
    }

    #[test]
    fn default_logger_respects_verbosity() {
        let headless = Headless::new();
        headless.log_init(LogImportance::Info, None);

        headless.log_emit(LogImportance::Debug, c"too verbose");
        headless.log_emit(LogImportance::Info, c"kept");

        assert_eq!(
            headless.take_default_log(),
            vec![(LogImportance::Info, String::from("kept"))]
        );
        assert!(headless.take_default_log().is_empty());
    }
}
