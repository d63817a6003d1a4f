use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CACHE_DIR_ENV_VAR: &str = "FEWSHOT_CACHE_DIR";

#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    /// Resolve the cache directory from, in order of priority:
    /// 1. An explicit path (from --cache-dir)
    /// 2. The FEWSHOT_CACHE_DIR environment variable
    /// 3. The XDG cache directory (~/.cache/fewshot/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var(CACHE_DIR_ENV_VAR) {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("fewshot")
                .get_cache_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG cache home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::CacheDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Database file used by the redb backend.
    pub fn redb_path(&self) -> PathBuf {
        self.root.join("cache.redb")
    }
}
