//! In-memory disk
//!
//! Used by tests and anywhere a fake volume is substituted for a real one.
//! Semantics mirror `LocalDisk`: writes stage in the writer and become
//! visible only on commit.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use stripeio_common::Result;
use tokio::io::AsyncWrite;

use crate::disk::{Disk, ShardReader, ShardWriter};

type FileMap = Arc<Mutex<BTreeMap<String, Bytes>>>;

/// Disk holding its files in memory
#[derive(Clone)]
pub struct MemDisk {
    id: String,
    files: FileMap,
}

impl MemDisk {
    /// Create an empty in-memory disk
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            files: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Number of files currently stored
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.lock().len()
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such file: {path}"))
}

#[async_trait]
impl Disk for MemDisk {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open(&self, path: &str) -> Result<ShardReader> {
        let data = self
            .files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))?;
        Ok(Box::new(io::Cursor::new(data.to_vec())))
    }

    async fn create(&self, path: &str) -> Result<Box<dyn ShardWriter>> {
        Ok(Box::new(MemShardWriter {
            path: path.to_string(),
            buf: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }

    async fn read_document(&self, path: &str) -> Result<Bytes> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path).into())
    }

    async fn write_document(&self, path: &str, data: &[u8]) -> Result<()> {
        self.files
            .lock()
            .insert(path.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .files
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path).into())
    }
}

struct MemShardWriter {
    path: String,
    buf: Vec<u8>,
    files: FileMap,
}

impl AsyncWrite for MemShardWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ShardWriter for MemShardWriter {
    async fn commit(self: Box<Self>) -> Result<()> {
        let data = Bytes::from(self.buf);
        self.files.lock().insert(self.path, data);
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_commit_makes_file_visible() {
        let disk = MemDisk::new("mem0");

        let mut writer = disk.create("xl/obj/data").await.unwrap();
        writer.write_all(b"abc").await.unwrap();
        assert_eq!(disk.file_count(), 0);
        writer.commit().await.unwrap();

        let mut reader = disk.open("xl/obj/data").await.unwrap();
        let mut read = Vec::new();
        reader.read_to_end(&mut read).await.unwrap();
        assert_eq!(read, b"abc");
    }

    #[tokio::test]
    async fn test_abort_discards() {
        let disk = MemDisk::new("mem0");

        let mut writer = disk.create("xl/obj/data").await.unwrap();
        writer.write_all(b"abc").await.unwrap();
        writer.abort().await.unwrap();

        assert_eq!(disk.file_count(), 0);
        assert!(disk.open("xl/obj/data").await.is_err());
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let disk = MemDisk::new("mem0");
        disk.write_document("xl/a", b"1").await.unwrap();
        disk.write_document("xl/b", b"2").await.unwrap();
        disk.write_document("yl/c", b"3").await.unwrap();

        assert_eq!(disk.list("xl/").await.unwrap(), vec!["xl/a", "xl/b"]);
        disk.remove("xl/a").await.unwrap();
        assert!(disk.remove("xl/a").await.is_err());
        assert_eq!(disk.list("xl/").await.unwrap(), vec!["xl/b"]);
    }
}
