//! Utilities to help with API request validation.

use std::str::FromStr;

use derive_more::derive::{AsRef, Deref, Display};
use idna::uts46::{self, Uts46};
use lettre::Address;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

/// A user's display name.
pub type UserName = BoundedString<3, 20>;

/// A user's password in plain text, as presented at sign-in. No complexity rules here; those only
/// apply when a password is set. Still must be nonempty, so a missing password is a validation
/// error rather than a failed credential check.
pub type UserPassword = BoundedString<1, 256>;

/// An email verification code in plain text.
pub type VerificationCode = BoundedString<6, 6>;

/// A password reset token in plain text.
pub type ResetToken = BoundedString<1, 256>;

/// A [`String`] newtype that guarantees its length in characters is within a certain range.
///
/// Leading and trailing whitespace is stripped before the bounds are checked, so a value of
/// nothing but spaces counts as empty.
#[derive(
    Deref,
    AsRef,
    Display,
    Deserialize,
    SerializeDisplay,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
)]
#[as_ref(forward)]
#[serde(try_from = "String")]
pub struct BoundedString<const MIN: usize, const MAX: usize>(String);

impl<const MIN: usize, const MAX: usize> BoundedString<MIN, MAX> {
    /// Consumes the [`BoundedString`], returning the wrapped [`String`].
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// An error constructing a [`BoundedString`].
#[derive(Error, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BoundedStringError<const MIN: usize, const MAX: usize> {
    /// The length was less than the [`BoundedString`]'s `MIN`.
    #[error("invalid length {0}, expected at least {MIN}")]
    TooShort(usize),

    /// The length was greater than the [`BoundedString`]'s `MAX`.
    #[error("invalid length {0}, expected at most {MAX}")]
    TooLong(usize),
}

impl<const MIN: usize, const MAX: usize> TryFrom<String> for BoundedString<MIN, MAX> {
    type Error = BoundedStringError<MIN, MAX>;

    fn try_from(string: String) -> Result<Self, Self::Error> {
        let trimmed = string.trim();
        let length = trimmed.chars().count();

        if length < MIN {
            Err(BoundedStringError::TooShort(length))
        } else if length > MAX {
            Err(BoundedStringError::TooLong(length))
        } else {
            Ok(Self(trimmed.to_owned()))
        }
    }
}

/// A user's new password in plain text. Trimmed of surrounding whitespace, then required to have
/// a minimum length and minimum complexity: at least one letter, one digit and one special
/// character, with no characters outside that set.
#[derive(Deref, AsRef, Deserialize, Clone, PartialEq, Eq, Debug)]
#[as_ref(forward)]
#[serde(try_from = "String")]
pub struct NewUserPassword(String);

/// The special characters a [`NewUserPassword`] may (and must) contain.
const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*";

/// An error constructing a [`NewUserPassword`].
#[derive(Error, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum NewUserPasswordError {
    /// The password was shorter than 8 characters.
    #[error("Password is too short!")]
    TooShort,

    /// The password was longer than 256 characters.
    #[error("Password is too long!")]
    TooLong,

    /// The password was missing a letter, digit or special character, or contained a character
    /// outside the allowed set.
    #[error("Password is too simple!")]
    TooSimple,
}

impl TryFrom<String> for NewUserPassword {
    type Error = NewUserPasswordError;

    fn try_from(string: String) -> Result<Self, Self::Error> {
        let string = string.trim();
        let length = string.chars().count();

        if length < 8 {
            return Err(NewUserPasswordError::TooShort);
        }

        if length > 256 {
            return Err(NewUserPasswordError::TooLong);
        }

        let allowed = string
            .chars()
            .all(|char| char.is_ascii_alphanumeric() || PASSWORD_SPECIAL_CHARS.contains(char));
        let has_letter = string.chars().any(|char| char.is_ascii_alphabetic());
        let has_digit = string.chars().any(|char| char.is_ascii_digit());
        let has_special = string.chars().any(|char| PASSWORD_SPECIAL_CHARS.contains(char));

        if !(allowed && has_letter && has_digit && has_special) {
            return Err(NewUserPasswordError::TooSimple);
        }

        Ok(Self(string.to_owned()))
    }
}

/// A user-inputted email address. Ensures the address uses a domain name with a TLD, and normalizes
/// the domain name (for non-ASCII characters).
#[derive(
    Deref,
    AsRef,
    Display,
    DeserializeFromStr,
    Serialize,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
)]
#[as_ref(forward)]
pub struct UserEmail(Address);

impl UserEmail {
    /// The maximum length of a [`UserEmail`].
    ///
    /// As per RFC 3696 erratum 1690, the theoretical maximum is 254.
    pub const MAX_LENGTH: usize = 254;

    /// Gets a reference to the email address string.
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Consumes the [`UserEmail`], returning the wrapped [`Address`].
    pub fn into_inner(self) -> Address {
        self.0
    }
}

/// An error constructing a [`UserEmail`].
#[derive(Error, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum UserEmailError {
    /// The email address was invalid.
    #[error("invalid email address")]
    Invalid,

    /// The domain part was an IP address rather than a domain name. There's no reason to let users
    /// use IP addresses in emails; strict mail agents don't even allow it.
    #[error("IP addresses not allowed in email address")]
    IpAddr,
}

impl FromStr for UserEmail {
    type Err = UserEmailError;

    fn from_str(str: &str) -> Result<Self, Self::Err> {
        if str.len() > Self::MAX_LENGTH {
            return Err(UserEmailError::Invalid);
        }

        let Some((user, domain)) = str.rsplit_once('@') else {
            return Err(UserEmailError::Invalid);
        };

        if domain.starts_with('[') {
            return Err(UserEmailError::IpAddr);
        }

        let (domain, domain_result) = Uts46::new().to_user_interface(
            // These are the recommended arguments for this function.
            domain.as_bytes(),
            uts46::AsciiDenyList::URL,
            uts46::Hyphens::Allow,
            |_, _, _| true,
        );

        if domain_result.is_err() {
            return Err(UserEmailError::Invalid);
        }

        let Ok(address) = Address::new(user, domain.to_lowercase()) else {
            return Err(UserEmailError::Invalid);
        };

        Ok(Self(address))
    }
}
