use std::path::{Component, Path, PathBuf};

/// Why an entry name cannot be placed under the destination.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UnsafePath {
    #[error("absolute entry path")]
    Absolute,

    #[error("entry path escapes the destination directory")]
    EscapesDestination,

    #[error("entry path is empty")]
    Empty,
}

/// Turn a raw archive entry name into a path relative to the destination.
///
/// Backslashes count as separators. `.` segments are dropped and `..` segments are
/// resolved lexically; a `..` that would climb above the destination rejects the entry.
///
/// ```
/// use std::path::PathBuf;
/// use keygate_archive::{UnsafePath, sanitize_entry_path};
///
/// assert_eq!(sanitize_entry_path("bin/./app").unwrap(), PathBuf::from("bin/app"));
/// assert_eq!(sanitize_entry_path("a/../b.txt").unwrap(), PathBuf::from("b.txt"));
/// assert_eq!(sanitize_entry_path("../evil.txt"), Err(UnsafePath::EscapesDestination));
/// ```
pub fn sanitize_entry_path(raw: &str) -> Result<PathBuf, UnsafePath> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(UnsafePath::Absolute);
    }

    let mut result = PathBuf::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => result.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    return Err(UnsafePath::EscapesDestination);
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(UnsafePath::Absolute),
        }
    }

    if result.as_os_str().is_empty() {
        return Err(UnsafePath::Empty);
    }
    Ok(result)
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paths_pass_through() {
        assert_eq!(
            sanitize_entry_path("assets/textures/a.png").unwrap(),
            PathBuf::from("assets/textures/a.png")
        );
        assert_eq!(sanitize_entry_path("dir/").unwrap(), PathBuf::from("dir"));
    }

    #[test]
    fn test_backslash_separators() {
        assert_eq!(
            sanitize_entry_path("bin\\win\\app.exe").unwrap(),
            PathBuf::from("bin/win/app.exe")
        );
        assert_eq!(
            sanitize_entry_path("..\\..\\evil.dll"),
            Err(UnsafePath::EscapesDestination)
        );
    }

    #[test]
    fn test_traversal_rejected() {
        assert_eq!(
            sanitize_entry_path("../evil.txt"),
            Err(UnsafePath::EscapesDestination)
        );
        assert_eq!(
            sanitize_entry_path("a/../../evil.txt"),
            Err(UnsafePath::EscapesDestination)
        );
    }

    #[test]
    fn test_inner_traversal_resolved() {
        assert_eq!(
            sanitize_entry_path("a/b/../c.txt").unwrap(),
            PathBuf::from("a/c.txt")
        );
    }

    #[test]
    fn test_absolute_rejected() {
        assert_eq!(sanitize_entry_path("/etc/passwd"), Err(UnsafePath::Absolute));
        assert_eq!(sanitize_entry_path("C:/Windows/x"), Err(UnsafePath::Absolute));
        assert_eq!(sanitize_entry_path("c:evil"), Err(UnsafePath::Absolute));
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(sanitize_entry_path(""), Err(UnsafePath::Empty));
        assert_eq!(sanitize_entry_path("./"), Err(UnsafePath::Empty));
        assert_eq!(sanitize_entry_path("a/.."), Err(UnsafePath::Empty));
    }
}
