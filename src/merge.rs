//! Assembling scratch fragments into the final artifact.
use crate::error::MergeError;
use crate::store::{FragmentStore, ScratchFile};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> MergeError + '_ {
    move |source| MergeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Concatenates `parts` into `output` in ascending index order, removing each
/// scratch file from `store` once its bytes are appended. Returns the number
/// of bytes written.
///
/// `expected_total` is the planned size when known upfront; otherwise the sum
/// of the scratch lengths is expected. Any disagreement is a
/// [`MergeError::SizeMismatch`].
pub async fn merge_fragments(
    store: &FragmentStore,
    output: &Path,
    mut parts: Vec<ScratchFile>,
    expected_total: Option<u64>,
) -> Result<u64, MergeError> {
    parts.sort_by_key(|p| p.index);

    let stored: u64 = parts.iter().map(|p| p.len).sum();
    let expected = expected_total.unwrap_or(stored);
    if stored != expected {
        return Err(MergeError::SizeMismatch {
            expected,
            actual: stored,
        });
    }

    let file = File::create(output).await.map_err(io_err(output))?;
    let mut writer = BufWriter::new(file);
    let mut total = 0u64;

    for part in &parts {
        let mut reader = File::open(&part.path)
            .await
            .map_err(io_err(&part.path))?;
        let copied = tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(io_err(output))?;
        if copied != part.len {
            return Err(MergeError::SizeMismatch {
                expected: part.len,
                actual: copied,
            });
        }
        total += copied;

        // the bytes must be in the artifact before their only other copy goes away
        writer.flush().await.map_err(io_err(output))?;
        drop(reader);
        store.remove(part).await.map_err(io_err(&part.path))?;
        debug!(index = part.index, bytes = copied, "fragment merged");
    }

    writer.flush().await.map_err(io_err(output))?;

    if total != expected {
        return Err(MergeError::SizeMismatch {
            expected,
            actual: total,
        });
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn scratch(dir: &Path, index: usize, body: &[u8]) -> ScratchFile {
        let path = dir.join(format!("out.part{}", index));
        tokio::fs::write(&path, body).await.unwrap();
        ScratchFile {
            index,
            path,
            len: body.len() as u64,
        }
    }

    #[tokio::test]
    async fn test_merge_uses_index_order_not_arrival_order() {
        let dir = tempdir().unwrap();
        let store = FragmentStore::new(dir.path(), "out");
        let parts = vec![
            scratch(dir.path(), 2, b"!").await,
            scratch(dir.path(), 0, b"Hello").await,
            scratch(dir.path(), 1, b"World").await,
        ];
        let paths: Vec<_> = parts.iter().map(|p| p.path.clone()).collect();
        let output = dir.path().join("out");

        let total = merge_fragments(&store, &output, parts, Some(11))
            .await
            .unwrap();

        assert_eq!(total, 11);
        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"HelloWorld!");
        assert!(
            paths.iter().all(|p| !p.exists()),
            "scratch files must be removed"
        );
    }

    #[tokio::test]
    async fn test_merge_rejects_size_mismatch() {
        let dir = tempdir().unwrap();
        let store = FragmentStore::new(dir.path(), "out");
        let parts = vec![scratch(dir.path(), 0, b"Hello").await];
        let output = dir.path().join("out");

        let err = merge_fragments(&store, &output, parts, Some(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::SizeMismatch {
                expected: 10,
                actual: 5
            }
        ));
        // nothing was consumed
        assert!(dir.path().join("out.part0").exists());
    }

    #[tokio::test]
    async fn test_merge_detects_scratch_changed_on_disk() {
        let dir = tempdir().unwrap();
        let store = FragmentStore::new(dir.path(), "out");
        let mut part = scratch(dir.path(), 0, b"Hello").await;
        part.len = 6;
        let output = dir.path().join("out");

        let err = merge_fragments(&store, &output, vec![part], None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MergeError::SizeMismatch {
                expected: 6,
                actual: 5
            }
        ));
    }
}
