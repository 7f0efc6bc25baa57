use rand::Rng;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

use crate::config::CAPTCHA_DIGITS;

/// A numeric challenge gating session reset requests.
///
/// Drawing it is left to the caller; this type only generates and checks the
/// code.
pub struct Captcha {
    code: String,
}

impl Captcha {
    /// A uniformly random code, leading zeros included.
    pub fn generate() -> Self {
        let bound = 10u32.pow(CAPTCHA_DIGITS as u32);
        Self::from_code(OsRng.gen_range(0..bound))
    }

    fn from_code(code: u32) -> Self {
        Self { code: format!("{code:0width$}", width = CAPTCHA_DIGITS) }
    }

    /// The digits to render.
    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Checks a typed answer; surrounding whitespace is ignored.
    pub fn matches(&self, answer: &str) -> bool {
        let answer = answer.trim();
        answer.len() == self.code.len() && bool::from(answer.as_bytes().ct_eq(self.code.as_bytes()))
    }
}

impl std::fmt::Debug for Captcha {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Captcha([REDACTED])")
    }
}
