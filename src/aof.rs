use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Error;

/// Append-only file. Write commands are appended to it as encoded command arrays, so the file is
/// a plain concatenation of frames that can be replayed from the start to rebuild the store.
///
/// Appends go to the operating system right away, they reach the disk when the background task
/// syncs the file, once per flush interval. Cloning is cheap, clones append to the same file.
#[derive(Clone)]
pub struct Aof {
    inner: Arc<Inner>,
}

struct Inner {
    path: PathBuf,
    file: Mutex<File>,
}

impl Aof {
    /// Opens the file at `path`, creating it and its parent directories when missing, and spawns
    /// the task syncing it every `flush_interval`. The task stops once every clone is dropped.
    pub async fn open(path: impl AsRef<Path>, flush_interval: Duration) -> Result<Aof, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)
            .await?;

        let inner = Arc::new(Inner {
            path,
            file: Mutex::new(file),
        });

        tokio::spawn(sync_periodically(Arc::downgrade(&inner), flush_interval));

        info!("Append-only file opened at {:?}", inner.path);

        Ok(Aof { inner })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Appends the encoded frame and returns how many bytes were written. Concurrent appends
    /// never interleave.
    pub async fn append(&self, frame: &Frame) -> Result<usize, Error> {
        self.writer().await.append(frame).await
    }

    /// Locks the file for writing. Writers are served one at a time, in the order they asked.
    pub async fn writer(&self) -> AofWriter<'_> {
        AofWriter {
            file: self.inner.file.lock().await,
        }
    }

    /// Decodes every frame from the start of the file and hands it to `apply`, in order. A
    /// malformed or truncated frame stops the replay, frames before it stay applied. Returns how
    /// many frames were applied.
    pub async fn replay<F>(&self, mut apply: F) -> Result<usize, Error>
    where
        F: FnMut(Frame),
    {
        let file = File::open(&self.inner.path).await?;
        let mut frames = FramedRead::new(file, FrameCodec::new());

        let mut applied = 0;
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(frame) => {
                    apply(frame);
                    applied += 1;
                }
                Err(e) => {
                    warn!(
                        "Stopping replay of {:?} after {} frames: {}",
                        self.inner.path, applied, e
                    );
                    break;
                }
            }
        }

        Ok(applied)
    }

    /// Forces everything appended so far to disk.
    pub async fn sync(&self) -> Result<(), Error> {
        self.inner.sync().await
    }
}

/// Exclusive access to the append-only file. Holding it keeps every other write out, so what is
/// done while holding it happens in the order it is logged.
pub struct AofWriter<'a> {
    file: MutexGuard<'a, File>,
}

impl AofWriter<'_> {
    /// Appends the encoded frame and returns how many bytes were written.
    pub async fn append(&mut self, frame: &Frame) -> Result<usize, Error> {
        let bytes = frame.serialize();

        self.file.write_all(&bytes).await?;
        self.file.flush().await?;

        debug!("Appended {} bytes to the append-only file", bytes.len());

        Ok(bytes.len())
    }
}

impl Inner {
    async fn sync(&self) -> Result<(), Error> {
        let file = self.file.lock().await;
        file.sync_all().await?;
        Ok(())
    }
}

async fn sync_periodically(aof: Weak<Inner>, interval: Duration) {
    // A zero period is rejected by `interval`.
    let mut interval = tokio::time::interval(interval.max(Duration::from_millis(1)));
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;

        let Some(aof) = aof.upgrade() else {
            return;
        };

        if let Err(e) = aof.sync().await {
            warn!("Failed to sync {:?}: {}", aof.path, e);
        }
    }
}
