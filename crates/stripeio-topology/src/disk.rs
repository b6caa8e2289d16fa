//! Disk capability contract and the local-filesystem implementation

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use stripeio_common::Result;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Reader over one shard stream
pub type ShardReader = Box<dyn AsyncRead + Send + Unpin>;

/// Writer for one shard stream
///
/// A writer must be finalized on every exit path: `commit` promotes the
/// written bytes to the target path, `abort` discards them. Nothing
/// partial is ever visible under the target path.
#[async_trait]
pub trait ShardWriter: AsyncWrite + Send + Unpin {
    /// Promote the written bytes to the target path
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard the written bytes
    async fn abort(self: Box<Self>) -> Result<()>;
}

/// One storage volume
///
/// Paths use forward-slash separators relative to the disk root; the
/// implementation supplies the physical prefix.
#[async_trait]
pub trait Disk: Send + Sync {
    /// Stable identifier for logging
    fn id(&self) -> &str;

    /// Open a shard stream for reading
    async fn open(&self, path: &str) -> Result<ShardReader>;

    /// Create a shard stream for writing
    async fn create(&self, path: &str) -> Result<Box<dyn ShardWriter>>;

    /// Read a whole small document (metadata replicas)
    async fn read_document(&self, path: &str) -> Result<Bytes>;

    /// Atomically replace a whole small document
    async fn write_document(&self, path: &str, data: &[u8]) -> Result<()>;

    /// List file paths under a prefix, ascending
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove a single file
    async fn remove(&self, path: &str) -> Result<()>;
}

/// Disk backed by one filesystem directory
pub struct LocalDisk {
    id: String,
    root: PathBuf,
}

impl LocalDisk {
    /// Create a disk rooted at `root`; the directory is created on demand
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            id: root.display().to_string(),
            root,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut full = self.root.clone();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            full.push(part);
        }
        full
    }

    async fn ensure_parent(&self, full: &Path) -> Result<()> {
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Disk for LocalDisk {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open(&self, path: &str) -> Result<ShardReader> {
        let file = fs::File::open(self.resolve(path)).await?;
        Ok(Box::new(file))
    }

    async fn create(&self, path: &str) -> Result<Box<dyn ShardWriter>> {
        let dst = self.resolve(path);
        self.ensure_parent(&dst).await?;
        let tmp = dst.with_extension("part");
        let file = fs::File::create(&tmp).await?;
        Ok(Box::new(LocalShardWriter {
            file: Some(file),
            tmp,
            dst,
        }))
    }

    async fn read_document(&self, path: &str) -> Result<Bytes> {
        let data = fs::read(self.resolve(path)).await?;
        Ok(Bytes::from(data))
    }

    async fn write_document(&self, path: &str, data: &[u8]) -> Result<()> {
        let dst = self.resolve(path);
        self.ensure_parent(&dst).await?;
        let tmp = dst.with_extension("part");
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &dst).await?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let kind = entry.file_type().await?;
                if kind.is_dir() {
                    stack.push(entry.path());
                } else if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                    let rel = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    if rel.starts_with(prefix) {
                        found.push(rel);
                    }
                }
            }
        }
        found.sort();
        Ok(found)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        fs::remove_file(self.resolve(path)).await?;
        Ok(())
    }
}

/// Writer that stages into a `.part` sibling and renames on commit
struct LocalShardWriter {
    file: Option<fs::File>,
    tmp: PathBuf,
    dst: PathBuf,
}

impl AsyncWrite for LocalShardWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_write(cx, buf),
            None => Poll::Ready(Err(finalized_error())),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Err(finalized_error())),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.file.as_mut() {
            Some(file) => Pin::new(file).poll_shutdown(cx),
            None => Poll::Ready(Err(finalized_error())),
        }
    }
}

fn finalized_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "shard writer already finalized")
}

#[async_trait]
impl ShardWriter for LocalShardWriter {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        fs::rename(&self.tmp, &self.dst).await?;
        Ok(())
    }

    async fn abort(mut self: Box<Self>) -> Result<()> {
        self.file.take();
        fs::remove_file(&self.tmp).await?;
        Ok(())
    }
}

impl Drop for LocalShardWriter {
    fn drop(&mut self) {
        // A writer dropped without commit leaves no staging file behind
        if self.file.take().is_some() {
            let _ = std::fs::remove_file(&self.tmp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_create_commit_open() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());

        let mut writer = disk.create("xl/b$0$0/obj/data").await.unwrap();
        writer.write_all(b"shard bytes").await.unwrap();
        writer.commit().await.unwrap();

        let mut reader = disk.open("xl/b$0$0/obj/data").await.unwrap();
        let mut read = Vec::new();
        reader.read_to_end(&mut read).await.unwrap();
        assert_eq!(read, b"shard bytes");
    }

    #[tokio::test]
    async fn test_abort_promotes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());

        let mut writer = disk.create("xl/obj/data").await.unwrap();
        writer.write_all(b"partial").await.unwrap();
        writer.abort().await.unwrap();

        assert!(disk.open("xl/obj/data").await.is_err());
        assert!(disk.list("xl/obj").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_drop_cleans_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());

        {
            let mut writer = disk.create("xl/obj/data").await.unwrap();
            writer.write_all(b"partial").await.unwrap();
        }
        assert!(disk.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_document_roundtrip_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let disk = LocalDisk::new(dir.path());

        disk.write_document("xl/bucket_metadata.json", b"{}")
            .await
            .unwrap();
        disk.write_document("xl/b$0$0/a/object_metadata.json", b"{}")
            .await
            .unwrap();

        assert_eq!(
            disk.read_document("xl/bucket_metadata.json").await.unwrap(),
            Bytes::from_static(b"{}")
        );
        let listed = disk.list("xl/").await.unwrap();
        assert_eq!(
            listed,
            vec![
                "xl/b$0$0/a/object_metadata.json".to_string(),
                "xl/bucket_metadata.json".to_string(),
            ]
        );

        disk.remove("xl/bucket_metadata.json").await.unwrap();
        assert!(disk.read_document("xl/bucket_metadata.json").await.is_err());
    }
}
