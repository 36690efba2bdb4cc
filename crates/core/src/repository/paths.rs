//! Lexical path helpers; nothing here touches the filesystem

use std::path::{Component, Path, PathBuf};

/// Resolves `.` and `..` components without following symlinks
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `path` expressed relative to `base`, `.` when they are the same
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path = normalize(path);
    let base = normalize(base);
    let path_parts: Vec<Component> = path.components().collect();
    let base_parts: Vec<Component> = base.components().collect();

    let common = path_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &path_parts[common..] {
        out.push(part.as_os_str());
    }

    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Strips the `//` root marker, `./` prefixes and trailing separators;
/// the repository root itself becomes the empty buildpath
pub fn clean_buildpath(input: &str) -> String {
    let trimmed = input.strip_prefix("//").unwrap_or(input);
    let normalized = normalize(Path::new(trimmed));
    let rendered = normalized.to_string_lossy();
    if rendered == "." {
        String::new()
    } else {
        rendered.into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/repo/a/./b/../c")), PathBuf::from("/repo/a/c"));
        assert_eq!(normalize(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize(Path::new("../a/../../b")), PathBuf::from("../../b"));
    }

    #[test]
    fn test_relative_to() {
        let root = Path::new("/Users/you/workspace/source");
        assert_eq!(
            relative_to(Path::new("/Users/you/workspace/source/finagle/finagle-mux"), root),
            PathBuf::from("finagle/finagle-mux")
        );
        assert_eq!(relative_to(root, root), PathBuf::from("."));
        assert_eq!(
            relative_to(Path::new("/Users/you/other"), root),
            PathBuf::from("../../other")
        );
    }

    #[test]
    fn test_clean_buildpath() {
        assert_eq!(clean_buildpath("//finagle/finagle-mux/"), "finagle/finagle-mux");
        assert_eq!(clean_buildpath("./finagle"), "finagle");
        assert_eq!(clean_buildpath("."), "");
        assert_eq!(clean_buildpath(""), "");
    }
}
