//! A small counting semaphore built on `parking_lot`, used by the driver
//! pool freelist (§4.2) and the reversioner's wake signal (§4.7). The
//! teacher depends on `parking_lot` throughout; the pack has no ready-made
//! blocking semaphore, so this is a direct, minimal build on its
//! `Mutex`/`Condvar` rather than a new dependency.

use parking_lot::{Condvar, Mutex};

pub struct Semaphore {
    count: Mutex<usize>,
    cv: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Semaphore { count: Mutex::new(initial), cv: Condvar::new() }
    }

    /// Blocks until a permit is available, then consumes it.
    pub fn acquire(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cv.wait(&mut count);
        }
        *count -= 1;
    }

    /// Releases one permit, waking a single waiter.
    pub fn post(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.cv.notify_one();
    }

    /// Current permit count, for diagnostics/tests only.
    pub fn available(&self) -> usize {
        *self.count.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn acquire_blocks_until_post() {
        let sem = Arc::new(Semaphore::new(0));
        let sem2 = sem.clone();
        let handle = thread::spawn(move || {
            sem2.acquire();
            42
        });
        thread::sleep(std::time::Duration::from_millis(20));
        sem.post();
        assert_eq!(handle.join().unwrap(), 42);
    }
}
