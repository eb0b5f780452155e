//! In-memory fake SFTP session for tests.
//!
//! Backs the whole tree with a `BTreeMap` and panics if two primitive calls
//! ever overlap, which pins down the serialization guarantee of
//! `SharedSession`: an SFTP session is single-channel request/response, so
//! overlapping calls would interleave protocol frames on a real wire.

use async_trait::async_trait;
use bytes::Bytes;
use sftpdav_session::{
    HandleId, RemoteEntry, RemoteStat, Result, SftpError, SftpOps, WriteMode,
};
use std::collections::{BTreeMap, HashMap};
use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Clone)]
enum FakeEntry {
    Dir,
    File(Vec<u8>),
}

struct FakeHandle {
    path: String,
    pos: u64,
}

#[derive(Default)]
struct FakeState {
    entries: BTreeMap<String, FakeEntry>,
    handles: HashMap<HandleId, FakeHandle>,
    next_handle: u64,
}

pub(crate) struct FakeSftp {
    state: Mutex<FakeState>,
    in_call: AtomicBool,
}

/// Marks one primitive call in flight; cleared on drop.
struct CallGuard<'a>(&'a AtomicBool);

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl FakeSftp {
    pub fn new() -> Self {
        let fake = Self {
            state: Mutex::new(FakeState::default()),
            in_call: AtomicBool::new(false),
        };
        fake.lock().entries.insert("/".to_string(), FakeEntry::Dir);
        fake
    }

    pub fn add_dir(&self, path: &str) {
        self.lock()
            .entries
            .insert(path.to_string(), FakeEntry::Dir);
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        self.lock()
            .entries
            .insert(path.to_string(), FakeEntry::File(content.to_vec()));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Asserts the session is not re-entered, then yields so that any
    /// concurrent caller that was going to overlap gets a chance to do so
    /// while the flag is still set.
    async fn enter(&self) -> CallGuard<'_> {
        let was_in_call = self.in_call.swap(true, Ordering::SeqCst);
        assert!(!was_in_call, "overlapping SFTP primitive calls observed");
        let guard = CallGuard(&self.in_call);
        tokio::task::yield_now().await;
        guard
    }

    fn op_failed(op: &'static str, path: &str, message: &str) -> SftpError {
        SftpError::Operation {
            op,
            path: path.to_string(),
            message: message.to_string(),
        }
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "/",
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn stat_of(entry: &FakeEntry) -> RemoteStat {
    match entry {
        FakeEntry::Dir => RemoteStat {
            is_dir: true,
            size: 0,
            modified: None,
        },
        FakeEntry::File(content) => RemoteStat {
            is_dir: false,
            size: content.len() as u64,
            modified: None,
        },
    }
}

#[async_trait]
impl SftpOps for FakeSftp {
    async fn read_dir(&mut self, path: &str) -> Result<Vec<RemoteEntry>> {
        let _guard = self.enter().await;
        let state = self.lock();
        match state.entries.get(path) {
            Some(FakeEntry::Dir) => {}
            Some(_) => return Err(Self::op_failed("readdir", path, "not a directory")),
            None => return Err(SftpError::NotFound(path.to_string())),
        }

        // Real servers report the pseudo-entries; the bridge must filter.
        let dot_stat = RemoteStat {
            is_dir: true,
            size: 0,
            modified: None,
        };
        let mut out = vec![
            RemoteEntry {
                name: ".".to_string(),
                stat: dot_stat,
            },
            RemoteEntry {
                name: "..".to_string(),
                stat: dot_stat,
            },
        ];
        for (entry_path, entry) in state.entries.iter() {
            if entry_path != path && parent_of(entry_path) == path {
                out.push(RemoteEntry {
                    name: name_of(entry_path).to_string(),
                    stat: stat_of(entry),
                });
            }
        }
        Ok(out)
    }

    async fn stat(&mut self, path: &str) -> Result<RemoteStat> {
        let _guard = self.enter().await;
        let state = self.lock();
        state
            .entries
            .get(path)
            .map(stat_of)
            .ok_or_else(|| SftpError::NotFound(path.to_string()))
    }

    async fn mkdir(&mut self, path: &str) -> Result<()> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        if state.entries.contains_key(path) {
            return Err(Self::op_failed("mkdir", path, "already exists"));
        }
        if !matches!(state.entries.get(parent_of(path)), Some(FakeEntry::Dir)) {
            return Err(SftpError::NotFound(parent_of(path).to_string()));
        }
        state.entries.insert(path.to_string(), FakeEntry::Dir);
        Ok(())
    }

    async fn rmdir(&mut self, path: &str) -> Result<()> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        match state.entries.get(path) {
            Some(FakeEntry::Dir) => {}
            Some(_) => return Err(Self::op_failed("rmdir", path, "not a directory")),
            None => return Err(SftpError::NotFound(path.to_string())),
        }
        let has_children = state
            .entries
            .keys()
            .any(|p| p != path && parent_of(p) == path);
        if has_children {
            return Err(Self::op_failed("rmdir", path, "directory not empty"));
        }
        state.entries.remove(path);
        Ok(())
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        if !state.entries.contains_key(from) {
            return Err(SftpError::NotFound(from.to_string()));
        }
        if state.entries.contains_key(to) {
            return Err(Self::op_failed("rename", to, "destination exists"));
        }
        let moved: Vec<(String, FakeEntry)> = state
            .entries
            .iter()
            .filter(|(p, _)| p.as_str() == from || p.starts_with(&format!("{from}/")))
            .map(|(p, e)| (format!("{to}{}", &p[from.len()..]), e.clone()))
            .collect();
        state
            .entries
            .retain(|p, _| p != from && !p.starts_with(&format!("{from}/")));
        state.entries.extend(moved);
        Ok(())
    }

    async fn unlink(&mut self, path: &str) -> Result<()> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        match state.entries.get(path) {
            Some(FakeEntry::File(_)) => {
                state.entries.remove(path);
                Ok(())
            }
            Some(_) => Err(Self::op_failed("unlink", path, "is a directory")),
            None => Err(SftpError::NotFound(path.to_string())),
        }
    }

    async fn open_read(&mut self, path: &str) -> Result<HandleId> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        match state.entries.get(path) {
            Some(FakeEntry::File(_)) => {}
            Some(_) => return Err(Self::op_failed("open-read", path, "is a directory")),
            None => return Err(SftpError::NotFound(path.to_string())),
        }
        state.next_handle += 1;
        let id = HandleId(state.next_handle);
        state.handles.insert(
            id,
            FakeHandle {
                path: path.to_string(),
                pos: 0,
            },
        );
        Ok(id)
    }

    async fn open_write(&mut self, path: &str, mode: WriteMode) -> Result<HandleId> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        match (mode, state.entries.get(path)) {
            (WriteMode::CreateExclusive, Some(_)) => {
                return Err(Self::op_failed("open-write", path, "file exists"));
            }
            (WriteMode::CreateExclusive, None) => {
                if !matches!(state.entries.get(parent_of(path)), Some(FakeEntry::Dir)) {
                    return Err(SftpError::NotFound(parent_of(path).to_string()));
                }
                state
                    .entries
                    .insert(path.to_string(), FakeEntry::File(Vec::new()));
            }
            (WriteMode::Truncate, Some(FakeEntry::File(_))) => {
                state
                    .entries
                    .insert(path.to_string(), FakeEntry::File(Vec::new()));
            }
            (WriteMode::Truncate, Some(_)) => {
                return Err(Self::op_failed("open-write", path, "is a directory"));
            }
            (WriteMode::Truncate, None) => {
                return Err(SftpError::NotFound(path.to_string()));
            }
        }
        state.next_handle += 1;
        let id = HandleId(state.next_handle);
        state.handles.insert(
            id,
            FakeHandle {
                path: path.to_string(),
                pos: 0,
            },
        );
        Ok(id)
    }

    async fn read_chunk(&mut self, handle: HandleId, count: usize) -> Result<Bytes> {
        let _guard = self.enter().await;
        let state = self.lock();
        let fh = state.handles.get(&handle).ok_or(SftpError::StaleHandle)?;
        let Some(FakeEntry::File(content)) = state.entries.get(&fh.path) else {
            return Err(SftpError::StaleHandle);
        };
        let start = (fh.pos as usize).min(content.len());
        let end = (start + count).min(content.len());
        let chunk = Bytes::copy_from_slice(&content[start..end]);
        drop(state);
        self.lock()
            .handles
            .get_mut(&handle)
            .ok_or(SftpError::StaleHandle)?
            .pos = end as u64;
        Ok(chunk)
    }

    async fn write_chunk(&mut self, handle: HandleId, data: &[u8]) -> Result<()> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        let path = state
            .handles
            .get(&handle)
            .ok_or(SftpError::StaleHandle)?
            .path
            .clone();
        match state.entries.get_mut(&path) {
            Some(FakeEntry::File(content)) => {
                content.extend_from_slice(data);
                Ok(())
            }
            _ => Err(SftpError::StaleHandle),
        }
    }

    async fn seek(&mut self, handle: HandleId, pos: SeekFrom) -> Result<u64> {
        let _guard = self.enter().await;
        let mut state = self.lock();
        let len = {
            let fh = state.handles.get(&handle).ok_or(SftpError::StaleHandle)?;
            match state.entries.get(&fh.path) {
                Some(FakeEntry::File(content)) => content.len() as i64,
                _ => 0,
            }
        };
        let fh = state.handles.get_mut(&handle).ok_or(SftpError::StaleHandle)?;
        let new_pos = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::End(n) => len + n,
            SeekFrom::Current(n) => fh.pos as i64 + n,
        };
        if new_pos < 0 {
            return Err(SftpError::Operation {
                op: "seek",
                path: fh.path.clone(),
                message: "negative seek position".to_string(),
            });
        }
        fh.pos = new_pos as u64;
        Ok(fh.pos)
    }

    async fn close(&mut self, handle: HandleId) -> Result<()> {
        let _guard = self.enter().await;
        self.lock()
            .handles
            .remove(&handle)
            .map(|_| ())
            .ok_or(SftpError::StaleHandle)
    }
}
