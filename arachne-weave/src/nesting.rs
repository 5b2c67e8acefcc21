//! 嵌套抑制守卫
//!
//! 按（通知身份 × 线程）记录协议是否已在执行中。
//! 状态是线程本地的，线程之间互不可见也无需同步。
//! 释放采用 RAII：无论被守卫的调用如何退出，`Drop` 都会清除标记。

use std::cell::RefCell;
use std::collections::HashSet;

thread_local! {
    // 当前线程上处于协议内的不可嵌套通知身份集合，惰性创建
    static ACTIVE: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
}

/// 嵌套抑制守卫
pub struct NestingGuard;

impl NestingGuard {
    /// 尝试以最外层身份进入
    ///
    /// 该通知已在当前线程的协议内时返回 `None`（抑制，不是错误）；
    /// 否则打上标记并返回作用域凭据。
    pub fn try_enter(advice_id: u64) -> Option<NestingEntry> {
        ACTIVE.with(|active| {
            if active.borrow_mut().insert(advice_id) {
                Some(NestingEntry { advice_id })
            } else {
                None
            }
        })
    }

    /// 该通知当前是否在本线程的协议内
    pub fn is_active(advice_id: u64) -> bool {
        ACTIVE.with(|active| active.borrow().contains(&advice_id))
    }
}

/// 最外层进入的作用域凭据
///
/// 离开作用域（包括展开退出）时清除标记。
pub struct NestingEntry {
    advice_id: u64,
}

impl Drop for NestingEntry {
    fn drop(&mut self) {
        ACTIVE.with(|active| {
            active.borrow_mut().remove(&self.advice_id);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outermost_entry_then_suppressed() {
        assert!(!NestingGuard::is_active(1));
        let entry = NestingGuard::try_enter(1).expect("outermost entry");
        assert!(NestingGuard::is_active(1));
        // 同一通知在同一线程上重入被抑制
        assert!(NestingGuard::try_enter(1).is_none());
        // 其它通知不受影响
        let other = NestingGuard::try_enter(2).expect("different advice id");
        drop(other);
        drop(entry);
        assert!(!NestingGuard::is_active(1));
    }

    #[test]
    fn test_release_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _entry = NestingGuard::try_enter(7).unwrap();
            panic!("boom");
        });
        assert!(result.is_err());
        // 展开后标记已清除
        assert!(!NestingGuard::is_active(7));
        assert!(NestingGuard::try_enter(7).is_some());
    }

    #[test]
    fn test_threads_are_independent() {
        let _entry = NestingGuard::try_enter(9).unwrap();
        let handle = std::thread::spawn(|| {
            // 另一线程看不到本线程的标记
            NestingGuard::try_enter(9).is_some()
        });
        assert!(handle.join().unwrap());
        assert!(NestingGuard::is_active(9));
    }
}
