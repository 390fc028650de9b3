//! Primality predicate
//!
//! Trial division up to √n, skipping multiples of 2 and 3 with the 6k±1 wheel.

use crate::partition::Chunk;
use crate::stats::WorkerResult;
use std::time::Instant;

/// Check whether `n` is prime
///
/// Values below 2 (including all negatives) are not prime.
///
/// # Examples
///
/// ```
/// use primeshard::worker::predicate::is_prime;
///
/// assert!(!is_prime(1));
/// assert!(is_prime(2));
/// assert!(is_prime(97));
/// assert!(!is_prime(-7));
/// ```
#[inline]
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    if n < 4 {
        return true;
    }
    if n % 2 == 0 || n % 3 == 0 {
        return false;
    }

    // i <= n / i is i * i <= n without the overflow
    let mut i: i64 = 5;
    while i <= n / i {
        if n % i == 0 || n % (i + 2) == 0 {
            return false;
        }
        i += 6;
    }
    true
}

/// Count the primes in a slice
pub fn count_primes(values: &[i64]) -> u64 {
    values.iter().filter(|&&n| is_prime(n)).count() as u64
}

/// Count one chunk in the calling thread, timing only the counting
pub fn count_chunk(chunk: &Chunk) -> WorkerResult {
    let start = Instant::now();
    let prime_count = count_primes(chunk.values());
    WorkerResult::new(chunk.index(), prime_count, start.elapsed())
}
