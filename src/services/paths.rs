use std::path::PathBuf;

/// Maps paths reported by the torrent backend onto the local mount of the
/// same downloads directory.
#[derive(Debug, Clone)]
pub struct PathTranslator {
    backend_root: String,
    local_root: PathBuf,
}

impl PathTranslator {
    pub fn new(backend_root: impl Into<String>, local_root: impl Into<PathBuf>) -> Self {
        Self {
            backend_root: backend_root.into(),
            local_root: local_root.into(),
        }
    }

    /// Swap the backend root prefix (ASCII case-insensitive) for the local
    /// root. Paths outside the backend root come back unchanged, so a
    /// misconfigured mount surfaces later as a missing-content failure.
    pub fn translate(&self, backend_path: &str) -> PathBuf {
        if backend_path.trim().is_empty() {
            return PathBuf::from(backend_path);
        }

        let prefix_len = self.backend_root.len();
        let matches_root = backend_path
            .get(..prefix_len)
            .is_some_and(|head| head.eq_ignore_ascii_case(&self.backend_root));
        if !matches_root {
            return PathBuf::from(backend_path);
        }

        let rest = backend_path[prefix_len..]
            .replace('\\', "/")
            .trim_start_matches('/')
            .to_string();

        if rest.is_empty() {
            self.local_root.clone()
        } else {
            self.local_root.join(rest)
        }
    }
}
