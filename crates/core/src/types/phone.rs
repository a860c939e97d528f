//! Iranian mobile numbers and one-time codes.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// Nothing but whitespace or punctuation was entered.
    #[error("phone number cannot be empty")]
    Empty,
    /// Wrong number of digits after stripping prefixes.
    #[error("phone number must have {expected} digits (got {actual})")]
    WrongLength { expected: usize, actual: usize },
    /// Mobile numbers start with 9 after the country/trunk prefix.
    #[error("mobile numbers must start with 9")]
    NotMobile,
}

/// Errors that can occur when parsing an [`OtpCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OtpCodeError {
    #[error("code cannot be empty")]
    Empty,
    #[error("code must be {min}-{max} digits")]
    WrongLength { min: usize, max: usize },
    #[error("code may only contain digits")]
    NotNumeric,
}

/// Map Persian (`۰-۹`) and Arabic-Indic (`٠-٩`) digits to ASCII.
///
/// Other characters pass through unchanged.
#[must_use]
pub fn to_ascii_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
            '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
            _ => c,
        })
        .collect()
}

/// A validated Iranian mobile number.
///
/// Stored as the 10 national digits (`9xxxxxxxxx`).
///
/// ## Accepted input
///
/// Digits may be ASCII, Persian or Arabic-Indic. Spaces, dashes, `+` and
/// other separators are ignored. A leading `0098`, `98` or `0` is stripped.
///
/// ```
/// use kala_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("0912 345 6789").unwrap();
/// assert_eq!(phone.international(), "989123456789");
/// assert!(PhoneNumber::parse("123456789").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// National significant number length.
    pub const DIGITS: usize = 10;

    /// Parse and normalize user input.
    ///
    /// # Errors
    ///
    /// Returns an error if no digits remain, if the number does not reduce
    /// to exactly 10 digits, or if it does not start with `9`.
    pub fn parse(input: &str) -> Result<Self, PhoneError> {
        let digits: String = to_ascii_digits(input)
            .chars()
            .filter(char::is_ascii_digit)
            .collect();

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        let national = strip_prefix(&digits);

        if national.len() != Self::DIGITS {
            return Err(PhoneError::WrongLength {
                expected: Self::DIGITS,
                actual: national.len(),
            });
        }

        if !national.starts_with('9') {
            return Err(PhoneError::NotMobile);
        }

        Ok(Self(national.to_owned()))
    }

    /// The 10 national digits, e.g. `9123456789`.
    #[must_use]
    pub fn national(&self) -> &str {
        &self.0
    }

    /// Country-code form sent to the API, e.g. `989123456789`.
    #[must_use]
    pub fn international(&self) -> String {
        format!("98{}", self.0)
    }

    /// Partially hidden form for display, e.g. `0912***6789`.
    #[must_use]
    pub fn masked(&self) -> String {
        let head = self.0.get(..3).unwrap_or_default();
        let tail = self.0.get(6..).unwrap_or_default();
        format!("0{head}***{tail}")
    }
}

/// Remove one country or trunk prefix, longest first.
fn strip_prefix(digits: &str) -> &str {
    if digits.len() > PhoneNumber::DIGITS {
        for prefix in ["0098", "98", "0"] {
            if let Some(rest) = digits.strip_prefix(prefix)
                && rest.len() == PhoneNumber::DIGITS
            {
                return rest;
            }
        }
    }
    digits
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0{}", self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

/// A one-time sign-in code as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    pub const MIN_LEN: usize = 4;
    pub const MAX_LEN: usize = 6;

    /// Parse a code, accepting Persian/Arabic digits and surrounding spaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the code is empty, has non-digits, or has the
    /// wrong length.
    pub fn parse(input: &str) -> Result<Self, OtpCodeError> {
        let code = to_ascii_digits(input.trim());
        if code.is_empty() {
            return Err(OtpCodeError::Empty);
        }
        if !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(OtpCodeError::NotNumeric);
        }
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&code.len()) {
            return Err(OtpCodeError::WrongLength {
                min: Self::MIN_LEN,
                max: Self::MAX_LEN,
            });
        }
        Ok(Self(code))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
