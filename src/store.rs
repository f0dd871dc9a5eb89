//! Scratch storage for downloaded fragments.
//!
//! Every fragment maps to one file under the scratch root, named after the
//! destination and the fragment index. These files outlive the process on
//! failure and are what a later run resumes from.
use crate::error::{FetchError, Result};
use crate::plan::Fragment;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::BufWriter;

/// Default scratch root: `<tmp>/.segfetch`.
pub fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join(".segfetch")
}

/// A fragment whose bytes are fully persisted in scratch storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchFile {
    pub index: usize,
    pub path: PathBuf,
    pub len: u64,
}

#[derive(Debug, Clone)]
pub struct FragmentStore {
    root: PathBuf,
    destination: String,
}

impl FragmentStore {
    pub fn new(root: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            destination: destination.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<dest>.part<N>` for byte ranges, `<root>/<dest>.seg<N>` for segments.
    pub fn path_for(&self, fragment: &Fragment) -> PathBuf {
        let kind = if fragment.is_segment() { "seg" } else { "part" };
        self.root
            .join(format!("{}.{}{}", self.destination, kind, fragment.index))
    }

    /// Creates the scratch root if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| FetchError::scratch(&self.root, e))
    }

    /// Length of the existing scratch file, or `None` when there is none.
    pub async fn probe(&self, fragment: &Fragment) -> Result<Option<u64>> {
        let path = self.path_for(fragment);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FetchError::scratch(path, e)),
        }
    }

    /// Creates (or truncates) the fragment's scratch file for writing.
    pub async fn create(&self, fragment: &Fragment) -> Result<BufWriter<File>> {
        let path = self.path_for(fragment);
        let file = File::create(&path)
            .await
            .map_err(|e| FetchError::scratch(&path, e))?;
        Ok(BufWriter::new(file))
    }

    /// Deletes a scratch file once its bytes live in the final artifact.
    pub async fn remove(&self, scratch: &ScratchFile) -> std::io::Result<()> {
        fs::remove_file(&scratch.path).await
    }

    pub fn scratch_file(&self, fragment: &Fragment, len: u64) -> ScratchFile {
        ScratchFile {
            index: fragment.index,
            path: self.path_for(fragment),
            len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{FragmentSource, plan_byte_ranges};
    use tempfile::tempdir;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_scratch_naming() {
        let store = FragmentStore::new("/scratch", "movie.mp4");
        let ranged = plan_byte_ranges(10, 5).unwrap();
        let segment = Fragment {
            index: 3,
            expected_size: None,
            source: FragmentSource::Segment {
                url: "http://x/3.ts".into(),
            },
        };

        assert_eq!(
            store.path_for(&ranged[1]),
            PathBuf::from("/scratch/movie.mp4.part1")
        );
        assert_eq!(
            store.path_for(&segment),
            PathBuf::from("/scratch/movie.mp4.seg3")
        );
    }

    #[tokio::test]
    async fn test_probe_create_and_lazy_root() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let store = FragmentStore::new(dir.path().join("nested/scratch"), "out.bin");
        let plan = plan_byte_ranges(8, 4)?;
        let fragment = &plan[0];

        store.ensure_root().await?;
        assert!(store.root().is_dir());
        assert_eq!(store.probe(fragment).await?, None);

        let mut writer = store.create(fragment).await?;
        writer.write_all(b"abcd").await?;
        writer.flush().await?;

        assert_eq!(store.probe(fragment).await?, Some(4));

        // create truncates an existing file
        let mut writer = store.create(fragment).await?;
        writer.flush().await?;
        assert_eq!(store.probe(fragment).await?, Some(0));

        store.remove(&store.scratch_file(fragment, 0)).await?;
        assert_eq!(store.probe(fragment).await?, None);
        assert!(store.remove(&store.scratch_file(fragment, 0)).await.is_err());

        Ok(())
    }
}
