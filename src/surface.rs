//! 表面树遍历 trampoline
//!
//! 原生遍历函数接收一个固定签名的迭代回调和一个 `void *`。这里把宿主闭包连同
//! 调用方的 `user_data` 一起放进栈上的 `Walk`，把 `surface_trampoline::<F>` 作为
//! 迭代回调交给原生侧，每访问一个节点就原样转发一次。
//!
//! 原生遍历没有错误返回通道：闭包 panic 时先记下载荷，忽略本次遍历剩余的节点，
//! 等原生函数返回后再在宿主侧恢复 panic。

use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};

use libc::{c_int, c_void};

use crate::backend::Backend;
use crate::ffi::wlr_surface;

/// 不持有所有权的原生表面句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Surface(NonNull<wlr_surface>);

impl Surface {
    /// # Safety
    ///
    /// `ptr` 必须是原生库中存活的表面，且在句柄使用期间保持存活。
    pub unsafe fn from_ptr(ptr: *mut wlr_surface) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub(crate) fn from_non_null(ptr: NonNull<wlr_surface>) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(self) -> *mut wlr_surface {
        self.0.as_ptr()
    }
}

/// 单次节点回调的上下文，生命周期限定在这次回调之内。
#[derive(Debug)]
pub struct IterationContext<'a> {
    surface: Surface,
    sx: i32,
    sy: i32,
    user_data: *mut c_void,
    _extent: PhantomData<&'a ()>,
}

impl IterationContext<'_> {
    pub fn surface(&self) -> Surface {
        self.surface
    }

    /// 相对根表面的偏移。
    pub fn offset(&self) -> (i32, i32) {
        (self.sx, self.sy)
    }

    pub fn user_data(&self) -> *mut c_void {
        self.user_data
    }
}

struct Walk<F> {
    handler: F,
    user_data: *mut c_void,
    panic: Option<Box<dyn Any + Send>>,
}

/// 交给原生遍历的迭代回调。
///
/// # Safety
///
/// `data` 必须指向 `iterate_surface_tree` 中构造的 `Walk<F>`。
unsafe extern "C" fn surface_trampoline<F>(
    surface: *mut wlr_surface,
    sx: c_int,
    sy: c_int,
    data: *mut c_void,
) where
    F: FnMut(IterationContext<'_>),
{
    let walk = &mut *data.cast::<Walk<F>>();
    if walk.panic.is_some() {
        return;
    }

    let Some(surface) = Surface::from_ptr(surface) else {
        error!("native surface iteration yielded a null surface");
        return;
    };

    let ctx = IterationContext {
        surface,
        sx,
        sy,
        user_data: walk.user_data,
        _extent: PhantomData,
    };

    let handler = &mut walk.handler;
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(ctx))) {
        walk.panic = Some(payload);
    }
}

/// 触发原生遍历，`handler` 对每个被访问的节点调用一次，顺序由原生库决定。
///
/// `user_data` 原样转发，本层不解引用。
pub fn iterate_surface_tree<F>(backend: &Backend, root: Surface, user_data: *mut c_void, handler: F)
where
    F: FnMut(IterationContext<'_>),
{
    let mut walk = Walk {
        handler,
        user_data,
        panic: None,
    };

    unsafe {
        backend.for_each_surface(
            root.as_ptr(),
            surface_trampoline::<F>,
            ptr::addr_of_mut!(walk).cast(),
        );
    }

    if let Some(payload) = walk.panic {
        panic::resume_unwind(payload);
    }
}

/// `iterate_surface_tree` 的便捷形式：闭包直接接收 (表面, sx, sy)。
pub fn for_each_surface<F>(backend: &Backend, root: Surface, mut f: F)
where
    F: FnMut(Surface, i32, i32),
{
    iterate_surface_tree(backend, root, ptr::null_mut(), |ctx| {
        let (sx, sy) = ctx.offset();
        f(ctx.surface(), sx, sy);
    });
}

/// `sub` 是否在以 `root` 为根的表面树中（含 `root` 自身）。
pub fn has_surface(backend: &Backend, root: Surface, sub: Surface) -> bool {
    let mut found = false;
    for_each_surface(backend, root, |surface, _, _| found |= surface == sub);
    found
}
