use std::fmt;

const VISIBLE_PREFIX: usize = 4;

/// A license token as entered by the user, with surrounding whitespace removed.
///
/// `Display` and `Debug` only show the first few characters; use
/// [`LicenseKey::expose`] where the full token must leave the process.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LicenseKey(String);

impl LicenseKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The full token.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short form safe for logs and user-facing messages.
    pub fn redacted(&self) -> String {
        let visible: String = self.0.chars().take(VISIBLE_PREFIX).collect();
        if self.0.chars().count() <= VISIBLE_PREFIX {
            "****".to_string()
        } else {
            format!("{visible}****")
        }
    }
}

impl fmt::Display for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for LicenseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LicenseKey({})", self.redacted())
    }
}

impl From<&str> for LicenseKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for LicenseKey {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// The caller's public network address at validation time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdentityFingerprint(String);

impl IdentityFingerprint {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
