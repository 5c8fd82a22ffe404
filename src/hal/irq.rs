//! 关中断自旋锁
//!
//! 超时回调和中断线程路径运行在中断上下文，它们与普通上下文共享同一把
//! 槽位锁。如果持锁时不关中断，中断里再抢同一把锁就会死锁，所以持有
//! `IrqLock` 的整个期间本地中断都是屏蔽的（通过 `critical_section`）。
//!
//! 访问只能以闭包形式进行，守卫不会逃逸出临界区，也就不可能在持锁时
//! 调用调度器。

use spin::Mutex;

pub struct IrqLock<T> {
    inner: Mutex<T>,
}

impl<T> IrqLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// 关中断、加锁后执行 `f`，返回前解锁并恢复中断状态
    #[inline]
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|_cs| {
            let mut guard = self.inner.lock();
            f(&mut guard)
        })
    }
}

impl<T: Default> Default for IrqLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
