use std::sync::atomic::{AtomicI64, Ordering};

/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Custom epoch: 2024-01-01 00:00:00 UTC
const EPOCH_MS: i64 = 1_704_067_200_000;

static LAST_TOKEN: AtomicI64 = AtomicI64::new(0);

/// Generate a strictly increasing, time-based i64 token.
///
/// Layout (53 bits, fits in JavaScript's Number.MAX_SAFE_INTEGER):
///   - 41 bits: milliseconds since 2024-01-01 UTC
///   - 12 bits: sequence within the millisecond
///
/// When more than 4096 tokens are requested within one millisecond, or the
/// clock steps backwards, the token keeps counting from the last issued value.
pub fn monotonic_token() -> i64 {
    let base = ((now_millis() - EPOCH_MS) & 0x1FF_FFFF_FFFF) << 12;
    let mut last = LAST_TOKEN.load(Ordering::Relaxed);
    loop {
        let next = base.max(last + 1);
        match LAST_TOKEN.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// Milliseconds since the custom epoch encoded in a token
pub fn token_timestamp_millis(token: i64) -> i64 {
    (token >> 12) + EPOCH_MS
}
