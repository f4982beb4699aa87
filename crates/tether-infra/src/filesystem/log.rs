//! JSONL conversation log.
//!
//! One file per conversation identity, one compact JSON message object per
//! line. Appends are flushed to stable storage before success is reported;
//! a rewrite goes through a temporary file and an atomic rename so a crash
//! mid-rewrite cannot lose the previous transcript.

use std::path::{Path, PathBuf};

use tether_core::log::ConversationLog;
use tether_types::error::PersistenceError;
use tether_types::message::Message;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Newline-delimited JSON log under a single data directory.
pub struct JsonlConversationLog {
    dir: PathBuf,
}

impl JsonlConversationLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the transcript file for an identity.
    pub fn path(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{identity}.jsonl"))
    }

    async fn ensure_dir(&self) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }
}

fn encode(message: &Message) -> Result<String, PersistenceError> {
    let mut line =
        serde_json::to_string(message).map_err(|e| PersistenceError::Io(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

async fn write_and_rename(path: &Path, contents: &str) -> Result<(), PersistenceError> {
    let tmp = path.with_extension("jsonl.tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(contents.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp, path)
        .await
        .map_err(|e| PersistenceError::Rename(e.to_string()))
}

impl ConversationLog for JsonlConversationLog {
    async fn append(&self, identity: &str, message: &Message) -> Result<(), PersistenceError> {
        self.ensure_dir().await?;
        let line = encode(message)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(identity))
            .await?;
        file.write_all(line.as_bytes()).await?;
        // Durable before the caller's success path continues.
        file.sync_data().await?;
        Ok(())
    }

    async fn load(&self, identity: &str) -> Result<Vec<Message>, PersistenceError> {
        let path = self.path(identity);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut messages = Vec::new();
        let mut skipped = 0usize;
        for (number, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    // Malformed records are skipped, never fatal.
                    skipped += 1;
                    warn!(
                        path = %path.display(),
                        line = number + 1,
                        "skipping malformed transcript record: {e}"
                    );
                }
            }
        }
        debug!(
            path = %path.display(),
            loaded = messages.len(),
            skipped,
            "transcript loaded"
        );
        Ok(messages)
    }

    async fn rewrite(&self, identity: &str, messages: &[Message]) -> Result<(), PersistenceError> {
        self.ensure_dir().await?;
        let mut contents = String::new();
        for message in messages {
            contents.push_str(&encode(message)?);
        }
        write_and_rename(&self.path(identity), &contents).await
    }

    async fn clear(&self, identity: &str) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path(identity)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_messages(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::user(format!("question {i}"))
                } else {
                    Message::assistant(format!("answer {i}"), i as u32)
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_append_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let log = JsonlConversationLog::new(tmp.path());

        let messages = sample_messages(5);
        for m in &messages {
            log.append("chat", m).await.unwrap();
        }

        let loaded = log.load("chat").await.unwrap();
        assert_eq!(loaded.len(), 5);
        for (a, b) in messages.iter().zip(&loaded) {
            assert_eq!(a.text, b.text);
            assert_eq!(a.role, b.role);
            assert_eq!(a.completion_tokens, b.completion_tokens);
        }
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let log = JsonlConversationLog::new(tmp.path());

        log.append("chat", &Message::user("one")).await.unwrap();
        log.append("chat", &Message::user("two")).await.unwrap();

        // Corrupt the middle of the file by hand.
        let path = log.path("chat");
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("{not valid json\n");
        std::fs::write(&path, raw).unwrap();
        log.append("chat", &Message::user("three")).await.unwrap();

        let loaded = log.load("chat").await.unwrap();
        // Exactly the three well-formed records, not four and not zero.
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].text, "three");
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let log = JsonlConversationLog::new(tmp.path());
        assert!(log.load("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rewrite_replaces_contents_and_leaves_no_tmp() {
        let tmp = TempDir::new().unwrap();
        let log = JsonlConversationLog::new(tmp.path());

        for m in sample_messages(4) {
            log.append("chat", &m).await.unwrap();
        }
        let keep = sample_messages(4).split_off(2);
        log.rewrite("chat", &keep).await.unwrap();

        let loaded = log.load("chat").await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].text, "question 2");
        assert!(!log.path("chat").with_extension("jsonl.tmp").exists());
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let tmp = TempDir::new().unwrap();
        let log = JsonlConversationLog::new(tmp.path());
        log.append("chat", &Message::user("x")).await.unwrap();
        log.clear("chat").await.unwrap();
        assert!(!log.path("chat").exists());
        // Clearing again is a no-op.
        log.clear("chat").await.unwrap();
    }
}
