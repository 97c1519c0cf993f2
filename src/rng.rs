//! A random source that several threads can draw from at once.
//!
//! Every randomized operation in this crate takes an explicit `&mut impl CryptoRngCore`. When
//! authorities run on separate threads but must share one generator, hand each of them a clone
//! of a [`SharedRng`]: the clones point at the same generator and every draw is serialized on
//! its lock.
use crypto_bigint::rand_core::{CryptoRng, Error, RngCore};
use rand::{rngs::StdRng, SeedableRng};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug)]
pub struct SharedRng<R> {
    inner: Arc<Mutex<R>>,
}

impl<R: RngCore + CryptoRng> SharedRng<R> {
    pub fn new(rng: R) -> Self {
        return Self {
            inner: Arc::new(Mutex::new(rng)),
        };
    }

    /// A panic while drawing leaves the generator in a usable state, so a poisoned lock is
    /// simply taken over.
    fn lock(&self) -> MutexGuard<'_, R> {
        return self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }
}

impl SharedRng<StdRng> {
    /// A shared generator seeded from the operating system
    pub fn from_entropy() -> Self {
        return Self::new(StdRng::from_entropy());
    }
}

impl<R> Clone for SharedRng<R> {
    fn clone(&self) -> Self {
        return Self {
            inner: Arc::clone(&self.inner),
        };
    }
}

impl<R: RngCore + CryptoRng> RngCore for SharedRng<R> {
    fn next_u32(&mut self) -> u32 {
        return self.lock().next_u32();
    }

    fn next_u64(&mut self) -> u64 {
        return self.lock().next_u64();
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.lock().fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        return self.lock().try_fill_bytes(dest);
    }
}

impl<R: RngCore + CryptoRng> CryptoRng for SharedRng<R> {}
