//! OTP sign-in flow.
//!
//! Two steps (phone, then code) with a resend cooldown that escalates with
//! the number of codes sent. The cooldown is a courtesy to the SMS
//! provider; the API enforces its own limits.
//!
//! ```text
//! EnteringPhone ──send──▶ CodeSent ──verify──▶ Verifying ──ok──▶ Authenticated
//!       ▲                  │   ▲                    │
//!       └──change phone────┘   └──────failed────────┘
//! ```

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::types::PhoneNumber;

/// How long a `Verifying` state blocks a second attempt.
///
/// After this a stuck attempt (e.g. the request was dropped) is treated as
/// abandoned.
pub const VERIFY_TIMEOUT_SECS: i64 = 30;

/// Errors from an invalid transition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    /// A resend was requested before the cooldown elapsed.
    #[error("please wait {remaining_secs} seconds before requesting a new code")]
    CooldownActive { remaining_secs: u64 },
    /// A verification request is already in flight.
    #[error("a verification is already in progress")]
    VerificationInFlight,
    /// The action does not apply to the current step.
    #[error("no code has been sent yet")]
    NoCodeSent,
}

/// Cooldown before the next resend, given how many codes have been sent so
/// far (the first send counts as 1).
#[must_use]
pub const fn resend_cooldown_secs(send_count: u32) -> u64 {
    match send_count {
        0..=2 => 120,
        3..=4 => 300,
        _ => 600,
    }
}

/// A code that has been sent to a phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub phone: PhoneNumber,
    pub send_count: u32,
    pub resend_at: DateTime<Utc>,
}

impl Challenge {
    fn new(phone: PhoneNumber, send_count: u32, now: DateTime<Utc>) -> Self {
        let cooldown = i64::try_from(resend_cooldown_secs(send_count)).unwrap_or(i64::MAX);
        Self {
            phone,
            send_count,
            resend_at: now + TimeDelta::seconds(cooldown),
        }
    }

    /// Seconds until a resend is allowed, never negative.
    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((self.resend_at - now).num_seconds()).unwrap_or(0)
    }
}

/// Where the user is in the sign-in flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SignInStep {
    #[default]
    EnteringPhone,
    CodeSent(Challenge),
    Verifying {
        challenge: Challenge,
        started_at: DateTime<Utc>,
    },
    Authenticated,
}

impl SignInStep {
    /// First code sent for `phone`.
    #[must_use]
    pub fn code_sent(phone: PhoneNumber, now: DateTime<Utc>) -> Self {
        Self::CodeSent(Challenge::new(phone, 1, now))
    }

    /// The active challenge, if a code has been sent.
    #[must_use]
    pub const fn challenge(&self) -> Option<&Challenge> {
        match self {
            Self::CodeSent(challenge) | Self::Verifying { challenge, .. } => Some(challenge),
            Self::EnteringPhone | Self::Authenticated => None,
        }
    }

    /// Check that a resend is allowed now. Returns the phone to send to.
    ///
    /// # Errors
    ///
    /// [`OtpError::CooldownActive`] before `resend_at`,
    /// [`OtpError::NoCodeSent`] if no code was ever sent.
    pub fn check_resend(&self, now: DateTime<Utc>) -> Result<&PhoneNumber, OtpError> {
        let challenge = match self {
            Self::CodeSent(challenge) => challenge,
            Self::Verifying { .. } => return Err(OtpError::VerificationInFlight),
            Self::EnteringPhone | Self::Authenticated => return Err(OtpError::NoCodeSent),
        };
        let remaining_secs = challenge.remaining_secs(now);
        if remaining_secs > 0 {
            return Err(OtpError::CooldownActive { remaining_secs });
        }
        Ok(&challenge.phone)
    }

    /// Record a successful resend.
    ///
    /// # Errors
    ///
    /// Same as [`SignInStep::check_resend`].
    pub fn resent(self, now: DateTime<Utc>) -> Result<Self, OtpError> {
        self.check_resend(now)?;
        match self {
            Self::CodeSent(challenge) => Ok(Self::CodeSent(Challenge::new(
                challenge.phone,
                challenge.send_count.saturating_add(1),
                now,
            ))),
            _ => Err(OtpError::NoCodeSent),
        }
    }

    /// Enter `Verifying`. Only one attempt may be in flight.
    ///
    /// # Errors
    ///
    /// [`OtpError::VerificationInFlight`] while a recent attempt is running,
    /// [`OtpError::NoCodeSent`] outside the code step.
    pub fn begin_verify(self, now: DateTime<Utc>) -> Result<Self, OtpError> {
        match self {
            Self::CodeSent(challenge) => Ok(Self::Verifying {
                challenge,
                started_at: now,
            }),
            Self::Verifying {
                challenge,
                started_at,
            } => {
                if (now - started_at).num_seconds() < VERIFY_TIMEOUT_SECS {
                    Err(OtpError::VerificationInFlight)
                } else {
                    Ok(Self::Verifying {
                        challenge,
                        started_at: now,
                    })
                }
            }
            Self::EnteringPhone | Self::Authenticated => Err(OtpError::NoCodeSent),
        }
    }

    /// The API rejected the code: back to the code step.
    #[must_use]
    pub fn verify_failed(self) -> Self {
        match self {
            Self::Verifying { challenge, .. } => Self::CodeSent(challenge),
            other => other,
        }
    }

    /// Start over with a different phone number.
    #[must_use]
    pub const fn change_phone() -> Self {
        Self::EnteringPhone
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn phone() -> PhoneNumber {
        PhoneNumber::parse("09123456789").unwrap()
    }

    #[test]
    fn test_cooldown_escalation() {
        assert_eq!(resend_cooldown_secs(1), 120);
        assert_eq!(resend_cooldown_secs(2), 120);
        assert_eq!(resend_cooldown_secs(3), 300);
        assert_eq!(resend_cooldown_secs(4), 300);
        assert_eq!(resend_cooldown_secs(5), 600);
        assert_eq!(resend_cooldown_secs(12), 600);
    }

    #[test]
    fn test_resend_before_cooldown_rejected() {
        let step = SignInStep::code_sent(phone(), now());
        let later = now() + TimeDelta::seconds(30);
        assert_eq!(
            step.check_resend(later),
            Err(OtpError::CooldownActive { remaining_secs: 90 })
        );
    }

    #[test]
    fn test_resend_escalates() {
        let mut t = now();
        let mut step = SignInStep::code_sent(phone(), t);
        let mut cooldowns = Vec::new();
        for _ in 0..5 {
            let challenge = step.challenge().unwrap().clone();
            cooldowns.push((challenge.resend_at - t).num_seconds());
            t = challenge.resend_at;
            step = step.resent(t).unwrap();
        }
        assert_eq!(cooldowns, vec![120, 120, 300, 300, 600]);
        assert_eq!(step.challenge().unwrap().send_count, 6);
    }

    #[test]
    fn test_remaining_never_negative() {
        let step = SignInStep::code_sent(phone(), now());
        let much_later = now() + TimeDelta::hours(2);
        assert_eq!(step.challenge().unwrap().remaining_secs(much_later), 0);
        assert!(step.check_resend(much_later).is_ok());
    }

    #[test]
    fn test_single_verification_in_flight() {
        let step = SignInStep::code_sent(phone(), now())
            .begin_verify(now())
            .unwrap();
        assert_eq!(
            step.clone().begin_verify(now() + TimeDelta::seconds(1)),
            Err(OtpError::VerificationInFlight)
        );
        // an abandoned attempt does not lock the user out
        let stale = now() + TimeDelta::seconds(VERIFY_TIMEOUT_SECS);
        assert!(step.begin_verify(stale).is_ok());
    }

    #[test]
    fn test_verify_failed_returns_to_code_step() {
        let sent = SignInStep::code_sent(phone(), now());
        let failed = sent.clone().begin_verify(now()).unwrap().verify_failed();
        assert_eq!(failed, sent);
    }

    #[test]
    fn test_verify_without_code() {
        assert_eq!(
            SignInStep::EnteringPhone.begin_verify(now()),
            Err(OtpError::NoCodeSent)
        );
    }

    #[test]
    fn test_session_roundtrip_shape() {
        let step = SignInStep::code_sent(phone(), now());
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step"], "code_sent");
        assert_eq!(json["phone"], "9123456789");
        let back: SignInStep = serde_json::from_value(json).unwrap();
        assert_eq!(back, step);
    }
}
