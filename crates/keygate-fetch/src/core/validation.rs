use url::Url;

use crate::error::{FetchError, Result};

/// Returns `true` for the redirect status codes the fetcher follows.
///
/// ```
/// use keygate_fetch::is_redirect;
///
/// assert!(is_redirect(302));
/// assert!(!is_redirect(304));
/// ```
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// Statuses that fail a transfer even though the transport succeeded.
pub fn is_http_error(status: u16) -> bool {
    status >= 400
}

/// Resolve a `Location` header against the URL that produced it.
pub fn resolve_location(current: &str, location: &str) -> Result<String> {
    let base = Url::parse(current).map_err(|e| FetchError::InvalidUrl {
        url: current.to_string(),
        reason: e.to_string(),
    })?;
    base.join(location)
        .map(String::from)
        .map_err(|e| FetchError::InvalidUrl {
            url: location.to_string(),
            reason: e.to_string(),
        })
}

/// Post-transfer plausibility check on the number of bytes that landed on disk.
pub fn check_file_size(size: u64, min: u64) -> Result<()> {
    if size == 0 {
        return Err(FetchError::EmptyFile);
    }
    if size < min {
        return Err(FetchError::Undersized { size, min });
    }
    Ok(())
}
