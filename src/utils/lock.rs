use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{Ordering, AtomicBool};

pub trait Mutex<T> {
    fn acquire(&self) -> MutexGuard<'_, T>;
    fn release(&self);
    fn get_data(&self) -> &mut T;
    fn get_name(&self) -> &'static str;
}

pub struct MutexGuard<'a, T> {
    mutex: &'a dyn Mutex<T>
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        self.mutex.get_data()
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.mutex.get_data()
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.release()
    }
}

/// Busy-waiting lock. Only ever contended between a syscall and an
/// interrupt handler on the same core, so critical sections must stay short.
#[derive(Debug)]
pub struct SpinMutex<T> {
    is_acquired : AtomicBool,
    name        : &'static str,
    data        : UnsafeCell<T>,
}

impl<T> SpinMutex<T> {
    pub const fn new(name: &'static str, data: T) -> Self {
        Self {
            is_acquired: AtomicBool::new(false),
            name,
            data: UnsafeCell::new(data)
        }
    }

    pub fn is_locked(&self) -> bool {
        self.is_acquired.load(Ordering::Acquire)
    }
}

impl<T> Mutex<T> for SpinMutex<T> {
    fn acquire(&self) -> MutexGuard<'_, T> {
        while self.is_acquired.swap(true, Ordering::AcqRel) {
            spin_loop();
        }
        MutexGuard{mutex: self}
    }

    fn release(&self) {
        self.is_acquired.store(false, Ordering::Release)
    }

    #[allow(clippy::mut_from_ref)]
    fn get_data(&self) -> &mut T {
        unsafe {&mut *self.data.get()}
    }

    fn get_name(&self) -> &'static str {
        self.name
    }
}

unsafe impl<T> Send for SpinMutex<T> where T: Send {}
unsafe impl<T> Sync for SpinMutex<T> where T: Send {}
unsafe impl<T> Send for MutexGuard<'_, T> where T: Send {}
unsafe impl<T> Sync for MutexGuard<'_, T> where T: Send + Sync {}
