//! Run-scoped artifact directory.
//!
//! Every run writes its segment files under `<work_dir>/<run_id>/`, addressed
//! by input index, so concurrent runs with distinct ids never share a file.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TesseraError};

const CONCAT_LIST_NAME: &str = "concat_list.txt";

#[derive(Debug, Clone)]
pub struct RunArena {
    root: PathBuf,
}

impl RunArena {
    /// Create `<work_dir>/<run_id>` if it does not exist yet.
    pub async fn create(work_dir: &Path, run_id: &str) -> Result<Self> {
        let run_id = run_id.trim();
        if run_id.is_empty()
            || run_id
                .chars()
                .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
            || run_id == "."
            || run_id == ".."
        {
            return Err(TesseraError::usage(format!(
                "run id `{run_id}` cannot be used as a directory name"
            )));
        }

        let root = work_dir.join(run_id);
        tokio::fs::create_dir_all(&root).await?;
        debug!(path = %root.display(), "Created run arena");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn segment_path(&self, index: usize) -> PathBuf {
        self.root.join(format!("segment_{index:05}.ts"))
    }

    pub fn concat_list_path(&self) -> PathBuf {
        self.root.join(CONCAT_LIST_NAME)
    }

    /// Remove the run directory if nothing is left in it.
    pub async fn remove_if_empty(&self) -> Result<bool> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        if entries.next_entry().await?.is_some() {
            return Ok(false);
        }
        tokio::fs::remove_dir(&self.root).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn paths_are_scoped_by_run_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let a = RunArena::create(dir.path(), "run-a").await.unwrap();
        let b = RunArena::create(dir.path(), "run-b").await.unwrap();

        assert_ne!(a.segment_path(0), b.segment_path(0));
        assert_ne!(a.segment_path(0), a.segment_path(1));
        assert_eq!(a.segment_path(7), dir.path().join("run-a").join("segment_00007.ts"));
        assert!(a.root().is_dir());
    }

    #[tokio::test]
    async fn rejects_ids_that_escape_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        for id in ["", "..", "a/b", "x\\y"] {
            assert!(
                matches!(
                    RunArena::create(dir.path(), id).await,
                    Err(TesseraError::Usage { .. })
                ),
                "id: {id:?}"
            );
        }
    }

    #[tokio::test]
    async fn removes_only_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let arena = RunArena::create(dir.path(), "run").await.unwrap();
        tokio::fs::write(arena.segment_path(0), b"x").await.unwrap();

        assert!(!arena.remove_if_empty().await.unwrap());
        tokio::fs::remove_file(arena.segment_path(0)).await.unwrap();
        assert!(arena.remove_if_empty().await.unwrap());
        assert!(!arena.root().exists());
    }
}
