use std::path::{Component, Path, PathBuf};

/// Resolve a requested working directory against the sandbox root.
///
/// The requested path may be relative (resolved against the root) or
/// absolute; either way it is normalized lexically - `..` and `.` are
/// folded without touching the filesystem, so the target does not need to
/// exist yet. If the result lands outside the root, the root itself is
/// returned instead of an error: callers always get a usable directory,
/// never a path that escapes the sandbox.
pub fn sanitize_cwd(root: &Path, requested: Option<&str>) -> PathBuf {
    let requested = match requested {
        Some(path) if !path.is_empty() => path,
        _ => return root.to_path_buf(),
    };

    let resolved = normalize(&root.join(requested));
    if resolved.starts_with(root) {
        resolved
    } else {
        root.to_path_buf()
    }
}

/// Lexical normalization: folds `.` away and resolves `..` against the
/// components accumulated so far. A `..` at the top of an absolute path is
/// dropped, mirroring how the OS resolves `/..` to `/`.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    normalized.pop();
                }
            }
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}
