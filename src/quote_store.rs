//! Durable, ordered list of quote image tokens.
//!
//! The list is backed by a single JSON document shaped like
//! `{"quotes": ["<file_id>", ...]}`. One dedicated thread owns the
//! document and runs every operation in submission order, so concurrent
//! appends never lose each other's updates.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{Builder as ThreadBuilder, JoinHandle};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::oneshot::channel as oneshot_channel;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access the quote store: {0}")]
    Io(#[from] io::Error),
    #[error("quote store {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("quote store thread has shut down")]
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The token was stored at `index`.
    Added { index: usize },
    /// The token was already present, nothing was written.
    Duplicate,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QuoteDocument {
    #[serde(default)]
    quotes: Vec<String>,
}

/// Synchronous access to the backing document. Only the store thread
/// touches it once the store is opened.
#[derive(Debug)]
pub(crate) struct DocumentFile {
    path: PathBuf,
}

impl DocumentFile {
    pub(crate) fn new<P>(path: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    pub(crate) fn load(&self) -> Result<Vec<String>, StoreError> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };

        let doc: QuoteDocument =
            serde_json::from_slice(&content).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        Ok(doc.quotes)
    }

    pub(crate) fn append(&self, token: String) -> Result<AppendOutcome, StoreError> {
        // A corrupt document fails here, before anything is written over it.
        let mut quotes = self.load()?;
        if quotes.contains(&token) {
            return Ok(AppendOutcome::Duplicate);
        }

        quotes.push(token);
        let index = quotes.len() - 1;
        self.save(quotes)?;
        Ok(AppendOutcome::Added { index })
    }

    fn save(&self, quotes: Vec<String>) -> Result<(), StoreError> {
        let doc = QuoteDocument { quotes };
        let serialized = serde_json::to_string_pretty(&doc).map_err(io::Error::from)?;

        // Write a sibling file and rename it over the document, readers
        // see either the old or the new content.
        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

/// A cloneable handle to the store thread.
#[derive(Clone)]
pub struct QuoteStore {
    inner: Arc<QuoteStoreInner>,
}

impl QuoteStore {
    /// Spawns the store thread for the document at `path`. The document
    /// doesn't need to exist yet.
    pub fn open<P>(path: P) -> Result<Self, StoreError>
    where
        P: AsRef<Path>,
    {
        let doc = DocumentFile::new(path);
        let (work_tx, work_rx) = channel(16);

        let store_thread = QuoteStoreThread { doc, work_rx };
        let join_handle = store_thread.start()?;

        Ok(Self {
            inner: Arc::new(QuoteStoreInner {
                join_handle: Some(join_handle),
                work_tx: Some(work_tx),
            }),
        })
    }

    pub async fn load(&self) -> Result<Vec<String>, StoreError> {
        self.query(|doc| doc.load()).await?
    }

    pub async fn append(&self, token: String) -> Result<AppendOutcome, StoreError> {
        self.query(move |doc| doc.append(token)).await?
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.load().await?.len())
    }

    async fn query<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&DocumentFile) -> R + Send + 'static,
        R: Send + 'static,
    {
        let work_tx = self.inner.work_tx.as_ref().ok_or(StoreError::Closed)?;

        let (res_tx, res_rx) = oneshot_channel();
        work_tx
            .send(AnyStoreWork::new_boxed(move |doc| {
                // The caller may have gone away, the result is just dropped then.
                let _ = res_tx.send(f(doc));
            }))
            .await
            .map_err(|_| StoreError::Closed)?;

        res_rx.await.map_err(|_| StoreError::Closed)
    }
}

struct QuoteStoreInner {
    join_handle: Option<JoinHandle<()>>,
    work_tx: Option<Sender<Box<dyn StoreWork>>>,
}

impl Drop for QuoteStoreInner {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain its queue and exit.
        self.work_tx.take();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("Quote store thread panicked");
            }
        }

        debug!("Quote store thread has shutdown");
    }
}

struct QuoteStoreThread {
    doc: DocumentFile,
    work_rx: Receiver<Box<dyn StoreWork>>,
}

impl QuoteStoreThread {
    fn start(self) -> Result<JoinHandle<()>, StoreError> {
        let join_handle = ThreadBuilder::new()
            .name("QuoteStoreThread".to_owned())
            .spawn(move || {
                let mut thread = self;
                thread.thread_main()
            })?;
        Ok(join_handle)
    }

    fn thread_main(&mut self) {
        // No more work to perform once every sender is gone.
        while let Some(mut work) = self.work_rx.blocking_recv() {
            work.perform(&self.doc);
        }
    }
}

trait StoreWork: Send {
    fn perform(&mut self, doc: &DocumentFile);
}

struct AnyStoreWork<F>
where
    F: FnOnce(&DocumentFile) + Send,
{
    f: Option<F>,
}

impl<F> AnyStoreWork<F>
where
    F: FnOnce(&DocumentFile) + Send,
{
    fn new_boxed(f: F) -> Box<Self> {
        Box::new(Self { f: Some(f) })
    }
}

impl<F> StoreWork for AnyStoreWork<F>
where
    F: FnOnce(&DocumentFile) + Send,
{
    fn perform(&mut self, doc: &DocumentFile) {
        if let Some(f) = self.f.take() {
            f(doc)
        }
    }
}
