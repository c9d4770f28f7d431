use std::path::{Component, Path};

/// A path rendered for display relative to some root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativePath {
    pub display: String,
    /// True when `path` is not under `root` and the display form is a
    /// fallback rather than a clean relative path.
    pub best_effort: bool,
}

/// Renders `path` relative to `root` with forward slashes. Never fails: a
/// path outside `root` falls back to its absolute form.
pub fn relativize(root: &Path, path: &Path) -> RelativePath {
    if let Ok(stripped) = path.strip_prefix(root) {
        return RelativePath {
            display: to_slash(stripped),
            best_effort: false,
        };
    }

    // Mixed relative/absolute inputs: compare canonical forms when both exist.
    if let (Ok(root_abs), Ok(path_abs)) = (root.canonicalize(), path.canonicalize())
        && let Ok(stripped) = path_abs.strip_prefix(&root_abs)
    {
        return RelativePath {
            display: to_slash(stripped),
            best_effort: false,
        };
    }

    let fallback = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    RelativePath {
        display: to_slash(&fallback),
        best_effort: true,
    }
}

fn to_slash(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir => Some(String::new()),
            Component::Prefix(prefix) => {
                Some(prefix.as_os_str().to_string_lossy().into_owned())
            }
            Component::CurDir => None,
        })
        .collect();
    if parts.len() == 1 && parts[0].is_empty() {
        return "/".to_string();
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_descendants_relative_to_root() {
        let rel = relativize(
            Path::new("/data/captures"),
            Path::new("/data/captures/general/1.md"),
        );
        assert_eq!(rel.display, "general/1.md");
        assert!(!rel.best_effort);
    }

    #[test]
    fn non_descendant_falls_back_without_failing() {
        let rel = relativize(Path::new("/data/captures"), Path::new("/elsewhere/x.md"));
        assert_eq!(rel.display, "/elsewhere/x.md");
        assert!(rel.best_effort);
    }

    #[test]
    fn root_outside_working_directory_still_strips() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().join("captures");
        let file = root.join("chan").join("42.md");
        let rel = relativize(&root, &file);
        assert_eq!(rel.display, "chan/42.md");
    }
}
