use std::fmt;

use chrono::Utc;

use rand::Rng;

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque token permanently attached to a subscriber, used in one-click unsubscribe links.
///
/// Generated tokens are a base-36 millisecond timestamp followed by `-` and two base-36
/// random fragments. The token only gates an unsubscribe action, it is not a credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnsubscribeToken(String);

impl UnsubscribeToken {
    /// Generate a fresh token
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();

        let timestamp = to_base36(Utc::now().timestamp_millis().unsigned_abs());
        let first = to_base36(rng.gen());
        let second = to_base36(rng.gen());

        Self(format!("{}-{}{}", timestamp, first, second))
    }
}

impl From<String> for UnsubscribeToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for UnsubscribeToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnsubscribeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".into();
    }

    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();

    // Only ASCII digits were pushed
    String::from_utf8(digits).unwrap_or_default()
}
