//! Phone-number canonicalization.
//!
//! Inbound numbers arrive in whatever shape the caller typed: spaces,
//! dashes, a leading `+`, or a bare national number. Canonicalization is
//! idempotent; every store key and rate-limit key is a canonical number.

use serde::{Deserialize, Serialize};

use otpgate_core::jid;

use crate::error::{OtpError, OtpResult};

/// Country-code completion rules.
///
/// A number that already starts with a known country prefix is left alone;
/// a bare national number of the expected length gets the default country
/// code prepended. The rule set is plain data so deployments can swap it
/// out via configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialPlan {
    /// Country prefixes that mark a number as already international.
    pub known_prefixes: Vec<String>,
    /// Country code prepended to bare national numbers.
    pub default_country: String,
    /// Digit count of a bare national number.
    pub national_length: usize,
    /// Trunk prefix dropped from nationally dialed numbers, e.g. the
    /// leading `0` in `0771234567`. Empty disables trunk stripping.
    pub trunk_prefix: String,
}

impl Default for DialPlan {
    fn default() -> Self {
        Self {
            known_prefixes: vec!["263".into(), "1".into(), "91".into()],
            default_country: "263".into(),
            national_length: 9,
            trunk_prefix: "0".into(),
        }
    }
}

impl DialPlan {
    /// Canonicalizes a raw phone number.
    ///
    /// Strips every non-digit, drops the trunk prefix from nationally
    /// dialed numbers, then applies the country-completion rule. Fails
    /// only when no digits remain.
    pub fn canonicalize(&self, raw: &str) -> OtpResult<String> {
        let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.is_empty() {
            return Err(OtpError::InvalidNumber(raw.to_string()));
        }

        if !self.trunk_prefix.is_empty()
            && digits.len() == self.trunk_prefix.len() + self.national_length
            && let Some(national) = digits.strip_prefix(self.trunk_prefix.as_str())
        {
            digits = national.to_string();
        }

        let international = self.known_prefixes.iter().any(|p| digits.starts_with(p));
        if !international && digits.len() == self.national_length {
            return Ok(format!("{}{digits}", self.default_country));
        }
        Ok(digits)
    }

    /// Canonicalizes and renders as a direct-conversation identifier.
    pub fn to_jid(&self, raw: &str) -> OtpResult<String> {
        Ok(jid::user_jid(&self.canonicalize(raw)?))
    }
}
