//! Deterministic prime table for token numbering
//!
//! Tokens of a snapshot are numbered in ascending token order and the `n`th
//! token gets the `n`th prime (first token → 2). The first primes come from a
//! sieve computed once; beyond that, candidates are checked by trial division.

use once_cell::sync::Lazy;

/// Sieve bound for the precomputed table
const SIEVE_LIMIT: usize = 1 << 16;

static SMALL_PRIMES: Lazy<Vec<u64>> = Lazy::new(|| sieve(SIEVE_LIMIT));

fn sieve(limit: usize) -> Vec<u64> {
    let mut composite = vec![false; limit + 1];
    let mut primes = Vec::new();
    for n in 2..=limit {
        if composite[n] {
            continue;
        }
        primes.push(n as u64);
        let mut m = n * n;
        while m <= limit {
            composite[m] = true;
            m += n;
        }
    }
    primes
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &p in SMALL_PRIMES.iter() {
        if p * p > n {
            return true;
        }
        if n % p == 0 {
            return false;
        }
    }
    let mut d = SIEVE_LIMIT as u64 + 1;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Iterator over all primes in ascending order, starting at 2
#[derive(Debug, Clone, Default)]
pub struct PrimeSequence {
    next_index: usize,
    last: u64,
}

impl PrimeSequence {
    /// Start at 2
    pub fn new() -> Self {
        Self::default()
    }
}

impl Iterator for PrimeSequence {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if let Some(&p) = SMALL_PRIMES.get(self.next_index) {
            self.next_index += 1;
            self.last = p;
            return Some(p);
        }
        let mut candidate = self.last + 2;
        while !is_prime(candidate) {
            candidate += 2;
        }
        self.last = candidate;
        Some(candidate)
    }
}

/// The `n`th prime, zero-based
pub fn nth_prime(n: usize) -> u64 {
    match SMALL_PRIMES.get(n) {
        Some(&p) => p,
        None => PrimeSequence::new().nth(n).unwrap_or(u64::MAX),
    }
}
