//! On-disk layout for one source job's chunks, audio, log, and resume
//! journal. Owns directory lifecycle under `<temp>/`.
//!
//! ```text
//! <temp>/split/<name>.mkv   raw segment
//! <temp>/encode/<name>.mkv  encoded segment
//! <temp>/audio.mkv          extracted audio (optional)
//! <temp>/log.log            append-only text log
//! <temp>/done.json          resume journal
//! <temp>/keyframes.log      keyframe-aligned split only
//! ```

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunk::{Chunk, ChunkState};

/// `done.json`'s on-disk shape: `{ "total": N, "done": { "<name>": frames } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Journal {
  total: usize,
  done: HashMap<String, usize>,
}

/// Owns `<temp>/` for one source job and the resume journal within it.
pub struct ChunkStore {
  pub temp: PathBuf,
  journal: Mutex<Journal>,
}

impl ChunkStore {
  /// Opens (creating if needed) the chunk store at `temp`. If `resume` is
  /// true and `done.json` exists, loads it; otherwise starts with an empty
  /// journal. `total` is the job's total frame count, written exactly once.
  pub fn open(temp: &Path, resume: bool, total: usize) -> anyhow::Result<Self> {
    if !resume {
      match fs::remove_dir_all(temp) {
        Ok(()) => debug!("removed stale temp directory: {}", temp.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
      }
    }

    for sub in ["split", "encode"] {
      let dir = temp.join(sub);
      if !dir.exists() {
        fs::create_dir_all(&dir)?;
        debug!("created directory: {}", dir.display());
      }
    }

    let journal_path = temp.join("done.json");
    let journal = if resume && journal_path.exists() {
      let text = fs::read_to_string(&journal_path)?;
      let mut journal: Journal = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("parsing {journal_path:?}: {e}"))?;
      if journal.total != total {
        info!(
          "resume journal total ({}) differs from current source total ({total}); keeping current",
          journal.total
        );
        journal.total = total;
      }
      journal
    } else {
      Journal { total, done: HashMap::new() }
    };

    let store = Self { temp: temp.to_path_buf(), journal: Mutex::new(journal) };
    store.rewrite_journal()?;
    Ok(store)
  }

  /// Enumerates the chunks already materialized under `split/`, in
  /// largest-split-file-first order, so the worker pool schedules the most
  /// expensive chunks first.
  pub fn enumerate_chunks(&self) -> anyhow::Result<Vec<Chunk>> {
    let split_dir = self.temp.join("split");
    let mut entries: Vec<(PathBuf, u64)> = fs::read_dir(&split_dir)?
      .filter_map(Result::ok)
      .map(|e| e.path())
      .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("mkv"))
      .filter_map(|p| fs::metadata(&p).ok().map(|m| (p, m.len())))
      .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    let journal = self.journal.lock().unwrap();
    let mut chunks = Vec::with_capacity(entries.len());
    for (index, (split_path, _)) in entries.into_iter().enumerate() {
      let name = split_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
      let encoded_path = self.temp.join("encode").join(format!("{name}.mkv"));
      let mut chunk = Chunk::new(index, split_path, encoded_path, 0);
      chunk.name = name.clone();
      if let Some(&frames) = journal.done.get(&name) {
        chunk.source_frames = frames;
        chunk.encoded_frames = Some(frames);
        chunk.state = ChunkState::Verified;
      }
      chunks.push(chunk);
    }
    Ok(chunks)
  }

  /// Records a chunk as verified: atomically rewrites the whole journal
  /// under the journal mutex (write-to-temp, rename), per the concurrency
  /// model's atomicity requirement.
  pub fn mark_verified(&self, name: &str, frames: usize) -> anyhow::Result<()> {
    let mut journal = self.journal.lock().unwrap();
    journal.done.insert(name.to_string(), frames);
    self.rewrite_journal_locked(&journal)
  }

  fn rewrite_journal(&self) -> anyhow::Result<()> {
    let journal = self.journal.lock().unwrap();
    self.rewrite_journal_locked(&journal)
  }

  fn rewrite_journal_locked(&self, journal: &Journal) -> anyhow::Result<()> {
    let path = self.temp.join("done.json");
    let tmp_path = self.temp.join("done.json.tmp");
    let text = serde_json::to_string(journal)?;
    {
      let mut f = fs::File::create(&tmp_path)?;
      f.write_all(text.as_bytes())?;
      f.sync_all()?;
    }
    fs::rename(&tmp_path, &path)?;
    Ok(())
  }

  /// `(total, already-verified)` frame counts, for seeding the progress bar
  /// on resume.
  pub fn load_progress(&self) -> (usize, usize) {
    let journal = self.journal.lock().unwrap();
    let initial = journal.done.values().sum();
    (journal.total, initial)
  }

  pub fn audio_path(&self) -> PathBuf {
    self.temp.join("audio.mkv")
  }

  pub fn log_path(&self) -> PathBuf {
    self.temp.join("log.log")
  }

  pub fn keyframes_log_path(&self) -> PathBuf {
    self.temp.join("keyframes.log")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fresh_store_has_empty_journal_and_zero_progress() {
    let dir = tempdir();
    let store = ChunkStore::open(&dir, false, 300).unwrap();
    assert_eq!(store.load_progress(), (300, 0));
  }

  #[test]
  fn mark_verified_then_reopen_with_resume_restores_progress() {
    let dir = tempdir();
    {
      let store = ChunkStore::open(&dir, false, 300).unwrap();
      store.mark_verified("00000", 100).unwrap();
      store.mark_verified("00001", 100).unwrap();
    }
    let reopened = ChunkStore::open(&dir, true, 300).unwrap();
    assert_eq!(reopened.load_progress(), (300, 200));
  }

  #[test]
  fn reopen_without_resume_discards_prior_journal() {
    let dir = tempdir();
    {
      let store = ChunkStore::open(&dir, false, 300).unwrap();
      store.mark_verified("00000", 100).unwrap();
    }
    let fresh = ChunkStore::open(&dir, false, 300).unwrap();
    assert_eq!(fresh.load_progress(), (300, 0));
  }

  fn tempdir() -> PathBuf {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let base = std::env::temp_dir().join(format!("chunkcast-test-{}-{n}", std::process::id()));
    std::fs::create_dir_all(&base).unwrap();
    base
  }
}
