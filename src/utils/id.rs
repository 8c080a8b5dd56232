// 文件: utils/id.rs
// 作用: 原子 ID 生成器，用于给监听器绑定和 headless 表面分配唯一标识

use std::sync::atomic::{AtomicU64, Ordering};

/// 计数器，返回唯一ID。
pub struct IdCounter {
    value: AtomicU64,
}

impl IdCounter {
    pub const fn new() -> Self {
        Self {
            // 从1开始：0 在原生侧常被当作空句柄
            value: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_and_increments() {
        let counter = IdCounter::new();
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
        assert_eq!(counter.next(), 3);
    }
}
