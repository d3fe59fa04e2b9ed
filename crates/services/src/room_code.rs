use rand::Rng;
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, warn};

use crate::dao::base::{DaoError, DaoResult};

/// Uppercase letters and digits without the look-alikes `0`, `O`, `1` and `I`.
pub const ROOM_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 6;

pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Codes are typed by hand, so lookups tolerate whitespace and lowercase.
pub fn normalize_room_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

pub fn is_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LEN && code.bytes().all(|b| ROOM_CODE_ALPHABET.contains(&b))
}

/// Draws codes until a claim succeeds, giving up after `max_attempts` claims.
#[derive(Debug, Clone)]
pub struct RoomCodeAllocator {
    max_attempts: u32,
}

impl RoomCodeAllocator {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `claim` atomically reserves a code (create-if-absent) and reports
    /// whether it won.
    pub async fn allocate<C, Fut>(&self, claim: C) -> DaoResult<String>
    where
        C: FnMut(String) -> Fut,
        Fut: Future<Output = DaoResult<bool>>,
    {
        self.allocate_with(|| generate_room_code(&mut rand::rng()), claim)
            .await
    }

    pub async fn allocate_with<D, C, Fut>(&self, mut draw: D, mut claim: C) -> DaoResult<String>
    where
        D: FnMut() -> String,
        C: FnMut(String) -> Fut,
        Fut: Future<Output = DaoResult<bool>>,
    {
        let mut tried = HashSet::new();
        let mut attempts = 0;
        // Re-draws of an already refused code do not count as attempts, but
        // they are bounded too.
        let mut draws_left = self.max_attempts.saturating_mul(8);

        while attempts < self.max_attempts && draws_left > 0 {
            draws_left -= 1;
            let code = draw();
            if !tried.insert(code.clone()) {
                continue;
            }

            attempts += 1;
            if claim(code.clone()).await? {
                debug!(%code, attempts, "Allocated room code");
                return Ok(code);
            }
            debug!(%code, attempts, "Room code already taken");
        }

        warn!(attempts, "Room code allocation exhausted");
        Err(DaoError::CodeSpaceExhausted(attempts))
    }
}
