//! One-time passcode issuance and verification
//!
//! Ephemeral adjacent state: codes live in process memory only and survive
//! neither restarts nor the configured expiry window. A record is consumed
//! on success, on expiry, and when the attempt budget runs out.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_OTP_TTL: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug)]
struct OtpRecord {
    code: String,
    issued_at: Instant,
    attempts: u32,
}

/// Outcome of a verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    /// No code was issued for this phone.
    NoPending,
    Expired,
    /// The attempt budget was already spent; the record is dropped.
    TooManyAttempts,
    Mismatch {
        attempts_left: u32,
    },
}

/// Phone number → pending code.
pub struct OtpStore {
    entries: Mutex<HashMap<String, OtpRecord>>,
    ttl: Duration,
    max_attempts: u32,
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::new(DEFAULT_OTP_TTL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl OtpStore {
    pub fn new(ttl: Duration, max_attempts: u32) -> Self {
        OtpStore {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_attempts,
        }
    }

    /// Issue a fresh 4-digit code, replacing any pending one.
    pub fn issue(&self, phone: &str) -> String {
        let code = rand::thread_rng().gen_range(1000..10000).to_string();
        let mut entries = self.entries.lock().expect("otp map poisoned");
        entries.insert(
            phone.to_string(),
            OtpRecord {
                code: code.clone(),
                issued_at: Instant::now(),
                attempts: 0,
            },
        );
        debug!(phone, "otp issued");
        code
    }

    /// Check a submitted code. The attempt budget is checked before the
    /// comparison, so the record disappears on the lookup after the last
    /// failed attempt.
    pub fn verify(&self, phone: &str, code: &str) -> VerifyOutcome {
        let mut entries = self.entries.lock().expect("otp map poisoned");

        let Some(record) = entries.get_mut(phone) else {
            return VerifyOutcome::NoPending;
        };

        if record.issued_at.elapsed() > self.ttl {
            entries.remove(phone);
            return VerifyOutcome::Expired;
        }

        if record.attempts >= self.max_attempts {
            entries.remove(phone);
            return VerifyOutcome::TooManyAttempts;
        }

        if record.code == code {
            entries.remove(phone);
            VerifyOutcome::Verified
        } else {
            record.attempts += 1;
            let attempts_left = self.max_attempts - record.attempts;
            VerifyOutcome::Mismatch { attempts_left }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue_and_verify() {
        let store = OtpStore::default();
        let code = store.issue("15550001111");
        assert_eq!(code.len(), 4);
        assert_eq!(store.verify("15550001111", &code), VerifyOutcome::Verified);
        // Consumed on success.
        assert_eq!(store.verify("15550001111", &code), VerifyOutcome::NoPending);
    }

    #[tokio::test]
    async fn test_mismatch_counts_down() {
        let store = OtpStore::default();
        store.issue("p");
        assert_eq!(
            store.verify("p", "0000"),
            VerifyOutcome::Mismatch { attempts_left: 2 }
        );
        assert_eq!(
            store.verify("p", "0000"),
            VerifyOutcome::Mismatch { attempts_left: 1 }
        );
        assert_eq!(
            store.verify("p", "0000"),
            VerifyOutcome::Mismatch { attempts_left: 0 }
        );
        // Budget spent: next lookup drops the record.
        assert_eq!(store.verify("p", "0000"), VerifyOutcome::TooManyAttempts);
        assert_eq!(store.verify("p", "0000"), VerifyOutcome::NoPending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_code_dropped() {
        let store = OtpStore::default();
        let code = store.issue("p");
        tokio::time::advance(Duration::from_secs(11 * 60)).await;
        assert_eq!(store.verify("p", &code), VerifyOutcome::Expired);
        assert_eq!(store.verify("p", &code), VerifyOutcome::NoPending);
    }

    #[tokio::test]
    async fn test_reissue_replaces_code() {
        let store = OtpStore::new(DEFAULT_OTP_TTL, 3);
        let first = store.issue("p");
        let second = store.issue("p");
        if first != second {
            assert_eq!(store.verify("p", &first), VerifyOutcome::Mismatch { attempts_left: 2 });
        }
        assert_eq!(store.verify("p", &second), VerifyOutcome::Verified);
    }
}
