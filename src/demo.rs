//! 作用：在 headless 后端上把三种 trampoline 各走一遍
//! 说明：供命令行 `demo` 子命令和集成测试使用

use std::cell::Cell;
use std::ptr::{self, NonNull};
use std::rc::Rc;

use anyhow::Context;
use libc::c_void;

use crate::backend::headless::Placement;
use crate::backend::Backend;
use crate::ffi::{self, wl_signal};
use crate::listener::Listener;
use crate::log::LogImportance;
use crate::surface::{for_each_surface, Surface};

/// 一次 demo 运行的统计。
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DemoReport {
    pub surfaces_visited: usize,
    pub notifications: u32,
}

pub fn run(backend: &Backend) -> anyhow::Result<DemoReport> {
    let headless = backend
        .headless()
        .context("the demo needs the headless backend")?;

    crate::wlr_log!(backend, LogImportance::Info, "demo starting on {}", backend.name());
    crate::wlr_log!(backend, LogImportance::Debug, "building surface tree");

    // 表面树：root 下挂一个 below 阴影和一个 above 弹窗，弹窗再挂一个 tooltip
    let root = headless.create_surface();
    headless
        .add_subsurface(root, -8, -8, Placement::Below)
        .context("error adding shadow")?;
    let popup = headless
        .add_subsurface(root, 40, 20, Placement::Above)
        .context("error adding popup")?;
    headless
        .add_subsurface(popup, 4, -12, Placement::Above)
        .context("error adding tooltip")?;

    let mut report = DemoReport::default();
    for_each_surface(backend, root, |surface, sx, sy| {
        info!("visited surface {:p} at ({sx}, {sy})", surface.as_ptr());
        report.surfaces_visited += 1;
    });

    // 信号 + 监听器：每个表面作为事件数据发一次 new_surface
    let mut signal = Box::new(wl_signal::zeroed());
    unsafe { ffi::wl_signal_init(&mut *signal) };
    let signal_ptr = NonNull::from(&mut *signal);

    let notifications = Rc::new(Cell::new(0));
    let counter = notifications.clone();
    let listener = Listener::new(move |data: *mut c_void| {
        let surface = data.cast::<Surface>();
        if !surface.is_null() {
            debug!("new_surface fired for {:?}", unsafe { *surface });
        }
        counter.set(counter.get() + 1);
    })?;
    unsafe { listener.connect(signal_ptr) }?;

    for mut surface in [root, popup] {
        unsafe { ffi::wl_signal_emit(signal_ptr.as_ptr(), ptr::addr_of_mut!(surface).cast()) };
    }
    drop(listener);
    // 监听器已解绑，这次触发不会到达任何处理对象
    unsafe { ffi::wl_signal_emit(signal_ptr.as_ptr(), ptr::null_mut()) };

    report.notifications = notifications.get();
    crate::wlr_log!(
        backend,
        LogImportance::Info,
        "demo finished: {} surfaces, {} notifications",
        report.surfaces_visited,
        report.notifications
    );

    Ok(report)
}
