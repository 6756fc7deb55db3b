use camino::{Utf8Component, Utf8Path, Utf8PathBuf};

/// Lexically normalize `path` against `root`.
///
/// Relative paths are joined onto `root`; `.` and `..` components are folded
/// without touching the filesystem so the same file always maps to one key.
pub fn normalize(root: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };

    let mut out = Utf8PathBuf::new();
    for component in joined.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_str()),
        }
    }
    out
}

/// Number of components, used to order directory removal deepest-first.
pub(crate) fn depth(path: &Utf8Path) -> usize {
    path.components().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_root() {
        let got = normalize(Utf8Path::new("/proj"), Utf8Path::new("public/index.html"));
        assert_eq!(got, Utf8PathBuf::from("/proj/public/index.html"));
    }

    #[test]
    fn dot_components_fold() {
        let got = normalize(
            Utf8Path::new("/proj"),
            Utf8Path::new("./public/../public/./sw.js"),
        );
        assert_eq!(got, Utf8PathBuf::from("/proj/public/sw.js"));
    }

    #[test]
    fn absolute_paths_ignore_root() {
        let got = normalize(Utf8Path::new("/proj"), Utf8Path::new("/other/a.txt"));
        assert_eq!(got, Utf8PathBuf::from("/other/a.txt"));
    }

    #[test]
    fn depth_counts_components() {
        assert!(depth(Utf8Path::new("/a/b/c")) > depth(Utf8Path::new("/a/b")));
    }
}
