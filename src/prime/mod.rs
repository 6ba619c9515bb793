//! Primality oracle
//!
//! Plain trial division up to the integer square root, plus the small helpers
//! the sieve scanner needs. Everything here is a pure function.

/// Returns whether `n` is prime.
///
/// Handles 2 and even numbers up front, then tries odd divisors in
/// `[3, isqrt(n)]`. The bound is computed once, so the loop cannot overflow
/// even for `n` close to `u64::MAX`.
pub fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }

    let limit = integer_sqrt(n);
    let mut d = 3;
    while d <= limit {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Exact floor of the square root of `n`.
pub fn integer_sqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }

    // f64 gets within one of the answer; fix it up with exact integer checks
    let mut root = (n as f64).sqrt() as u64;
    while root > 0 && root.checked_mul(root).map_or(true, |sq| sq > n) {
        root -= 1;
    }
    while (root + 1).checked_mul(root + 1).map_or(false, |sq| sq <= n) {
        root += 1;
    }
    root
}

/// All primes `<= limit`, ascending (sieve of Eratosthenes).
pub fn small_primes(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return Vec::new();
    }

    let limit = limit as usize;
    let mut composite = vec![false; limit + 1];
    let mut p = 2;
    while p * p <= limit {
        if !composite[p] {
            let mut multiple = p * p;
            while multiple <= limit {
                composite[multiple] = true;
                multiple += p;
            }
        }
        p += 1;
    }

    (2..=limit)
        .filter(|&i| !composite[i])
        .map(|i| i as u64)
        .collect()
}
