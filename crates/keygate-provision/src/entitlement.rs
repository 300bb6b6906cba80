use std::path::{Path, PathBuf};

use keygate_fs::AtomicWriteOptions;
use keygate_license::LicenseKey;

/// The local proof that a key completed provisioning: one line holding the key.
#[derive(Clone, Debug)]
pub struct EntitlementRecord {
    path: PathBuf,
}

impl EntitlementRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The key on the first line, or `None` when there is no record.
    pub fn load(&self) -> keygate_fs::Result<Option<LicenseKey>> {
        let content = keygate_fs::read_optional(&self.path)?;
        Ok(content.map(|content| LicenseKey::new(content.lines().next().unwrap_or_default())))
    }

    pub fn store(&self, key: &LicenseKey) -> keygate_fs::Result<()> {
        let line = format!("{}\n", key.expose());
        keygate_fs::atomic_write(
            &self.path,
            line.as_bytes(),
            AtomicWriteOptions::new().permissions(0o600),
        )
    }

    /// Returns `false` when there was no record.
    pub fn remove(&self) -> keygate_fs::Result<bool> {
        keygate_fs::remove_if_exists(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_load_remove() {
        let dir = tempdir().unwrap();
        let record = EntitlementRecord::new(dir.path().join("key.txt"));
        assert_eq!(record.load().unwrap(), None);

        record.store(&LicenseKey::new("ABCD-1234")).unwrap();
        assert_eq!(
            std::fs::read_to_string(record.path()).unwrap(),
            "ABCD-1234\n"
        );
        assert_eq!(record.load().unwrap(), Some(LicenseKey::new("ABCD-1234")));

        assert!(record.remove().unwrap());
        assert!(!record.remove().unwrap());
    }

    #[test]
    fn test_only_first_line_counts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.txt");
        std::fs::write(&path, "  KEY-1 \r\nsomething else\n").unwrap();
        assert_eq!(
            EntitlementRecord::new(&path).load().unwrap(),
            Some(LicenseKey::new("KEY-1"))
        );
    }

    #[test]
    fn test_empty_file_loads_empty_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("key.txt");
        std::fs::write(&path, "").unwrap();
        let key = EntitlementRecord::new(&path).load().unwrap().unwrap();
        assert!(key.is_empty());
    }
}
