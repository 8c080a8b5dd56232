// 构建脚本：仅在启用 `system-wlroots` 特性时编译日志 C 垫片并链接 wlroots。
// 默认构建使用进程内的 headless 模型，不需要任何系统库。

fn main() {
    println!("cargo:rerun-if-changed=shim/wlr_log_shim.c");

    #[cfg(feature = "system-wlroots")]
    system_wlroots();
}

#[cfg(feature = "system-wlroots")]
fn system_wlroots() {
    // 通过 pkg-config 查找 wlroots（会同时输出链接参数）
    let wlroots = ["wlroots-0.18", "wlroots-0.17", "wlroots"]
        .iter()
        .find_map(|name| pkg_config::Config::new().probe(name).ok())
        .expect("wlroots not found via pkg-config");
    let wayland = pkg_config::Config::new()
        .probe("wayland-server")
        .expect("wayland-server not found via pkg-config");

    let mut build = cc::Build::new();
    build.file("shim/wlr_log_shim.c").define("WLR_USE_UNSTABLE", None);
    for path in wlroots.include_paths.iter().chain(&wayland.include_paths) {
        build.include(path);
    }
    build.compile("wlr_log_shim");
}
