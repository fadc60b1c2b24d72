//! Buffer Store - append-only per-day record files
//!
//! The BufferStore owns the buffer directory. Records are appended to the
//! current day's file and read back lazily, one line at a time, by the
//! upload pipeline.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::NaiveDate;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::naming::file_name_for;
use crate::error::BufferResult;
use crate::types::EventRecord;
use crate::utils::local_today;

/// Size and creation time of one buffer file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferFileStat {
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Birth time, or last-modified time where the filesystem lacks birth time
    pub created: SystemTime,
}

/// Append-only store of buffer files in a single directory
///
/// Clones share the same append lock.
#[derive(Debug, Clone)]
pub struct BufferStore {
    dir: PathBuf,
    append_lock: Arc<Mutex<()>>,
}

impl BufferStore {
    /// Create a store rooted at `dir`. The directory is created on first append.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Get the buffer directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of a buffer file
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Append a record to today's buffer file
    ///
    /// Returns the name of the file written.
    pub async fn append(&self, record: &EventRecord) -> BufferResult<String> {
        self.append_on(local_today(), record).await
    }

    /// Append a record to the buffer file of a specific day
    pub async fn append_on(&self, date: NaiveDate, record: &EventRecord) -> BufferResult<String> {
        let name = file_name_for(date);
        let line = record.to_json_line()?;
        self.append_line(&name, &line).await?;
        debug!(file = %name, bytes = line.len(), "Appended record to buffer");
        Ok(name)
    }

    async fn append_line(&self, name: &str, line: &str) -> BufferResult<()> {
        let _appending = self.append_lock.lock().await;
        fs::create_dir_all(&self.dir).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(name))
            .await?;

        // Single write so a concurrent reader never sees half a line followed by another record
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        file.write_all(&buf).await?;
        file.sync_data().await?;

        Ok(())
    }

    /// Block appends while held
    ///
    /// The upload pipeline holds this between its final end-of-file check and
    /// deleting the file, so a record appended in that window is never lost.
    pub(crate) async fn lock_appends(&self) -> MutexGuard<'_, ()> {
        self.append_lock.lock().await
    }

    /// Names of all regular files in the buffer directory, sorted by name
    ///
    /// A missing directory is an empty store.
    pub async fn list_files(&self) -> BufferResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        names.sort();
        Ok(names)
    }

    /// Size and creation time of a buffer file
    pub async fn stat(&self, name: &str) -> BufferResult<BufferFileStat> {
        let metadata = fs::metadata(self.path_for(name)).await?;
        let created = metadata.created().or_else(|_| metadata.modified())?;

        Ok(BufferFileStat {
            name: name.to_string(),
            size: metadata.len(),
            created,
        })
    }

    /// Open a lazy line reader over a buffer file, starting at its beginning
    pub async fn read_lines(&self, name: &str) -> BufferResult<BufferLines> {
        let file = File::open(self.path_for(name)).await?;
        Ok(BufferLines {
            reader: BufReader::new(file),
            buf: Vec::new(),
        })
    }

    /// Remove a buffer file. Removing an already-missing file is not an error.
    pub async fn delete(&self, name: &str) -> BufferResult<()> {
        match fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Lazy, finite sequence of raw lines from one buffer file
///
/// Lines are decoded lossily so a corrupt byte sequence surfaces as an
/// unparseable record instead of a read error.
pub struct BufferLines {
    reader: BufReader<File>,
    buf: Vec<u8>,
}

impl BufferLines {
    /// Next line without its terminator, or `None` at end of file
    pub async fn next_line(&mut self) -> BufferResult<Option<String>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }

        while matches!(self.buf.last(), Some(b'\n') | Some(b'\r')) {
            self.buf.pop();
        }

        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PendingRecord, RecordStatus, RequestSnapshot};
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_record(n: usize) -> EventRecord {
        PendingRecord::start(
            "GET",
            "127.0.0.1",
            RequestSnapshot {
                url: format!("/items/{}", n),
                method: "GET".to_string(),
                user_agent: None,
                body: json!({}),
            },
            2048,
        )
        .complete(RecordStatus::Success, 200, json!({"n": n}))
    }

    async fn count_lines(store: &BufferStore, name: &str) -> usize {
        let mut lines = store.read_lines(name).await.unwrap();
        let mut count = 0;
        while let Some(line) = lines.next_line().await.unwrap() {
            if !line.trim().is_empty() {
                count += 1;
            }
        }
        count
    }

    #[tokio::test]
    async fn test_append_creates_directory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = BufferStore::new(temp_dir.path().join("nested").join("buffer"));

        let name = store.append(&sample_record(1)).await.unwrap();

        assert_eq!(name, file_name_for(local_today()));
        assert!(store.path_for(&name).exists());
        assert_eq!(store.list_files().await.unwrap(), vec![name]);
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let store = BufferStore::new(temp_dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();

        for i in 0..5 {
            store.append_on(date, &sample_record(i)).await.unwrap();
        }

        assert_eq!(count_lines(&store, "2024-5-1.log").await, 5);

        // A fresh reader starts from the beginning again
        let mut lines = store.read_lines("2024-5-1.log").await.unwrap();
        let first = lines.next_line().await.unwrap().unwrap();
        let record = EventRecord::from_json_line(&first).unwrap();
        assert_eq!(record.request.url, "/items/0");
    }

    #[tokio::test]
    async fn test_one_file_per_day() {
        let temp_dir = TempDir::new().unwrap();
        let store = BufferStore::new(temp_dir.path());

        let d1 = NaiveDate::from_ymd_opt(2024, 1, 30).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        store.append_on(d1, &sample_record(1)).await.unwrap();
        store.append_on(d2, &sample_record(2)).await.unwrap();
        store.append_on(d2, &sample_record(3)).await.unwrap();

        let files = store.list_files().await.unwrap();
        assert_eq!(files, vec!["2024-1-30.log".to_string(), "2024-1-31.log".to_string()]);
        assert_eq!(count_lines(&store, "2024-1-31.log").await, 2);
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = BufferStore::new(temp_dir.path().join("absent"));
        assert!(store.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_skips_subdirectories() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("archive")).unwrap();
        std::fs::write(temp_dir.path().join("2024-1-1.log"), "").unwrap();

        let store = BufferStore::new(temp_dir.path());
        assert_eq!(store.list_files().await.unwrap(), vec!["2024-1-1.log".to_string()]);
    }

    #[tokio::test]
    async fn test_stat_reports_size() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("2024-1-1.log"), "abcdef\n").unwrap();

        let store = BufferStore::new(temp_dir.path());
        let stat = store.stat("2024-1-1.log").await.unwrap();
        assert_eq!(stat.size, 7);
        assert!(stat.created <= SystemTime::now());
    }

    #[tokio::test]
    async fn test_read_lines_handles_crlf_and_bad_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let mut content = b"first\r\n\n".to_vec();
        content.extend_from_slice(&[0xff, 0xfe, b'\n']);
        content.extend_from_slice(b"last");
        std::fs::write(temp_dir.path().join("2024-1-1.log"), content).unwrap();

        let store = BufferStore::new(temp_dir.path());
        let mut lines = store.read_lines("2024-1-1.log").await.unwrap();

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("first"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some(""));
        assert!(lines.next_line().await.unwrap().is_some());
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("last"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = BufferStore::new(temp_dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 2, 2).unwrap();
        let name = store.append_on(date, &sample_record(0)).await.unwrap();

        store.delete(&name).await.unwrap();
        assert!(!store.path_for(&name).exists());
        store.delete(&name).await.unwrap();
    }
}
