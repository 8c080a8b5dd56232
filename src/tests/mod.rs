//! 跨模块场景测试：三种 trampoline 在同一个 headless 后端上组合使用

use std::cell::RefCell;
use std::ptr::{self, NonNull};
use std::rc::Rc;

use libc::c_void;

use crate::backend::headless::Placement;
use crate::backend::{Backend, Headless};
use crate::demo;
use crate::ffi::{self, wl_signal};
use crate::listener::{Listener, ListenerState};
use crate::log::tests::{capture, serialize};
use crate::log::{configure_logging, LogImportance};
use crate::surface::{for_each_surface, Surface};

#[test]
fn demo_reports_all_callbacks() {
    let backend = Backend::Headless(Headless::new());
    let report = demo::run(&backend).unwrap();
    assert_eq!(report.surfaces_visited, 4);
    assert_eq!(report.notifications, 2);
}

// 监听器回调里再遍历表面、再写日志：三种 trampoline 嵌套调用
#[test]
fn trampolines_nest_inside_listener_dispatch() {
    let _guard = serialize();
    let backend = Rc::new(Backend::Headless(Headless::new()));
    let (handler, captured) = capture();
    configure_logging(&backend, LogImportance::Debug, Some(handler));

    let headless = backend.headless().unwrap();
    let root = headless.create_surface();
    headless.add_subsurface(root, 3, 4, Placement::Above).unwrap();

    let mut signal = Box::new(wl_signal::zeroed());
    unsafe { ffi::wl_signal_init(&mut *signal) };
    let signal_ptr = NonNull::from(&mut *signal);

    let offsets = Rc::new(RefCell::new(Vec::new()));
    let inner_backend = backend.clone();
    let inner_offsets = offsets.clone();
    let listener = Listener::new(move |data: *mut c_void| {
        let root = unsafe { *data.cast::<Surface>() };
        for_each_surface(&inner_backend, root, |_, sx, sy| {
            inner_offsets.borrow_mut().push((sx, sy));
            crate::log::log(
                &inner_backend,
                LogImportance::Debug,
                format_args!("visit {sx},{sy}"),
            );
        });
    })
    .unwrap();
    unsafe { listener.connect(signal_ptr) }.unwrap();
    assert_eq!(listener.state(), ListenerState::Registered);

    let mut data = root;
    unsafe { ffi::wl_signal_emit(signal_ptr.as_ptr(), ptr::addr_of_mut!(data).cast()) };

    assert_eq!(*offsets.borrow(), vec![(0, 0), (3, 4)]);
    let messages: Vec<_> = captured.lock().unwrap().iter().map(|(_, m)| m.clone()).collect();
    assert_eq!(messages, ["visit 0,0", "visit 3,4"]);

    drop(listener);
    configure_logging(&backend, LogImportance::Debug, None);
}

#[test]
fn listeners_on_separate_signals_stay_separate() {
    let mut signals: Vec<_> = (0..2)
        .map(|_| {
            let mut signal = Box::new(wl_signal::zeroed());
            unsafe { ffi::wl_signal_init(&mut *signal) };
            signal
        })
        .collect();

    let hits = Rc::new(RefCell::new(Vec::new()));
    let listeners: Vec<_> = signals
        .iter_mut()
        .enumerate()
        .map(|(i, signal)| {
            let hits = hits.clone();
            let listener = Listener::new(move |_: *mut c_void| hits.borrow_mut().push(i)).unwrap();
            unsafe { listener.connect(NonNull::from(&mut **signal)) }.unwrap();
            listener
        })
        .collect();

    unsafe {
        ffi::wl_signal_emit(&mut *signals[1], ptr::null_mut());
        ffi::wl_signal_emit(&mut *signals[0], ptr::null_mut());
        ffi::wl_signal_emit(&mut *signals[1], ptr::null_mut());
    }
    assert_eq!(*hits.borrow(), [1, 0, 1]);

    drop(listeners);
    for signal in &signals {
        assert!(unsafe { ffi::wl_list_empty(&signal.listener_list) });
    }
}
