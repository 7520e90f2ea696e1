//! The atomic committer (§4.8): makes a resolved transaction's finalized
//! file-sessions durable, all-or-nothing, guarding against a second
//! concurrent invocation racing the same files.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use fs2::FileExt;

use crate::error::DriftPatchError;
use crate::session::FileSession;

static TEMP_FILE_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq)]
struct PathFingerprint {
    #[cfg(unix)]
    device: u64,
    #[cfg(unix)]
    inode: u64,
    length: u64,
    modified_nanos: Option<u128>,
}

fn capture_path_fingerprint(path: &Path) -> Result<PathFingerprint, DriftPatchError> {
    let metadata = fs::symlink_metadata(path).map_err(|error| DriftPatchError::io(path, error))?;

    if metadata.file_type().is_symlink() {
        return Err(DriftPatchError::InvalidRequest {
            message: format!("refusing to apply changes through symbolic link '{}'", path.display()),
        });
    }

    let modified_nanos = metadata
        .modified()
        .ok()
        .and_then(|timestamp| timestamp.duration_since(UNIX_EPOCH).ok())
        .map(|duration| duration.as_nanos());

    Ok(PathFingerprint {
        #[cfg(unix)]
        device: metadata.dev(),
        #[cfg(unix)]
        inode: metadata.ino(),
        length: metadata.len(),
        modified_nanos,
    })
}

struct Guard {
    fingerprint: PathFingerprint,
    content_hash: String,
}

/// What it takes to put one target back as found, if a later file in the
/// same transaction fails to commit.
enum Undo {
    RestoreExisting {
        bytes: Vec<u8>,
        permissions: fs::Permissions,
    },
    RemoveCreated,
}

struct CommitItem<'a> {
    session: &'a FileSession,
    _lock: Option<File>,
    guard: Option<Guard>,
}

/// Locks and fingerprints every dirty target before any write begins, so a
/// concurrent second invocation is caught before the transaction commits
/// anything rather than racing it silently.
fn prepare(sessions: &[FileSession]) -> Result<Vec<CommitItem<'_>>, DriftPatchError> {
    let mut items = Vec::new();
    for session in sessions {
        if !session.dirty {
            continue;
        }

        if session.original_bytes.is_some() {
            let lock_file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&session.path)
                .map_err(|error| DriftPatchError::io(&session.path, error))?;
            lock_file.try_lock_exclusive().map_err(|error| {
                if error.kind() == std::io::ErrorKind::WouldBlock {
                    DriftPatchError::ResourceBusy {
                        path: session.path.display().to_string(),
                    }
                } else {
                    DriftPatchError::io(&session.path, error)
                }
            })?;

            let fingerprint = capture_path_fingerprint(&session.path)?;
            let original_bytes = session.original_bytes.as_ref().expect("checked above");
            let content_hash = blake3::hash(original_bytes).to_hex().to_string();

            items.push(CommitItem {
                session,
                _lock: Some(lock_file),
                guard: Some(Guard {
                    fingerprint,
                    content_hash,
                }),
            });
        } else {
            items.push(CommitItem {
                session,
                _lock: None,
                guard: None,
            });
        }
    }
    Ok(items)
}

fn verify_guard(path: &Path, guard: &Guard) -> Result<(), DriftPatchError> {
    let current_fingerprint = capture_path_fingerprint(path)?;
    if current_fingerprint != guard.fingerprint {
        return Err(DriftPatchError::FileChangedDuringApply {
            path: path.display().to_string(),
        });
    }
    let current_bytes = fs::read(path).map_err(|error| DriftPatchError::io(path, error))?;
    if blake3::hash(&current_bytes).to_hex().to_string() != guard.content_hash {
        return Err(DriftPatchError::FileChangedDuringApply {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// Writes every dirty session to disk, all or nothing. Non-dirty sessions
/// (no modification touched the file, or every modification was an
/// idempotent skip) are left untouched and never locked.
pub fn commit_sessions(sessions: &[FileSession]) -> Result<(), DriftPatchError> {
    let items = prepare(sessions)?;
    let mut committed: Vec<(PathBuf, Undo)> = Vec::with_capacity(items.len());

    for item in &items {
        match commit_one(item) {
            Ok(undo) => committed.push((item.session.path.clone(), undo)),
            Err(error) => {
                if let Err(rollback_error) = rollback(&committed) {
                    return Err(DriftPatchError::RollbackFailed {
                        message: format!("original failure: {error}; rollback failure: {rollback_error}"),
                    });
                }
                return Err(error);
            }
        }
    }

    Ok(())
}

fn commit_one(item: &CommitItem<'_>) -> Result<Undo, DriftPatchError> {
    let path = &item.session.path;
    let contents = item.session.finalize();

    match (&item.session.original_bytes, &item.guard) {
        (Some(original_bytes), Some(guard)) => {
            let permissions = fs::metadata(path)
                .map_err(|error| DriftPatchError::io(path, error))?
                .permissions();
            write_via_temp_and_rename(path, &contents, Some(guard), Some(&permissions))?;
            Ok(Undo::RestoreExisting {
                bytes: original_bytes.clone(),
                permissions,
            })
        }
        _ => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|error| DriftPatchError::io(parent, error))?;
            }
            if path.exists() {
                return Err(DriftPatchError::FileChangedDuringApply {
                    path: path.display().to_string(),
                });
            }
            write_via_temp_and_rename(path, &contents, None, None)?;
            Ok(Undo::RemoveCreated)
        }
    }
}

fn write_via_temp_and_rename(
    path: &Path,
    contents: &[u8],
    guard: Option<&Guard>,
    permissions: Option<&fs::Permissions>,
) -> Result<(), DriftPatchError> {
    let (temp_path, mut temp_file) = create_temp_file_adjacent(path)?;

    let result = (|| {
        temp_file
            .write_all(contents)
            .map_err(|error| DriftPatchError::io(&temp_path, error))?;
        temp_file
            .sync_all()
            .map_err(|error| DriftPatchError::io(&temp_path, error))?;

        if let Some(guard) = guard {
            verify_guard(path, guard)?;
        }

        if let Some(permissions) = permissions {
            fs::set_permissions(&temp_path, permissions.clone())
                .map_err(|error| DriftPatchError::io(&temp_path, error))?;
        }
        drop(temp_file);

        fs::rename(&temp_path, path).map_err(|error| DriftPatchError::io(path, error))?;
        sync_parent_directory(path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn rollback(committed: &[(PathBuf, Undo)]) -> Result<(), DriftPatchError> {
    for (path, undo) in committed.iter().rev() {
        match undo {
            Undo::RestoreExisting { bytes, permissions } => {
                fs::write(path, bytes).map_err(|error| DriftPatchError::io(path, error))?;
                fs::set_permissions(path, permissions.clone())
                    .map_err(|error| DriftPatchError::io(path, error))?;
            }
            Undo::RemoveCreated => {
                fs::remove_file(path).map_err(|error| DriftPatchError::io(path, error))?;
            }
        }
    }
    Ok(())
}

fn create_temp_file_adjacent(path: &Path) -> Result<(PathBuf, File), DriftPatchError> {
    let parent = resolve_parent_directory(path);
    let file_name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("driftpatch-target");

    for _ in 0..64 {
        let counter = TEMP_FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_nanos());
        let temp_name = format!(".{file_name}.driftpatch-tmp-{nanos}-{counter}");
        let temp_path = parent.join(temp_name);

        match OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
        {
            Ok(file) => return Ok((temp_path, file)),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(error) => return Err(DriftPatchError::io(&temp_path, error)),
        }
    }

    Err(DriftPatchError::malformed(format!(
        "failed to allocate an adjacent temporary file for '{}'",
        path.display()
    )))
}

fn resolve_parent_directory(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn sync_parent_directory(path: &Path) -> Result<(), DriftPatchError> {
    #[cfg(unix)]
    {
        let parent = resolve_parent_directory(path);
        let directory_handle =
            File::open(&parent).map_err(|error| DriftPatchError::io(&parent, error))?;
        directory_handle
            .sync_all()
            .map_err(|error| DriftPatchError::io(&parent, error))
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn session_for(path: PathBuf, original: &str, new_contents: &str) -> FileSession {
        fs::write(&path, original).unwrap();
        let mut session = FileSession::load(&path).unwrap();
        session.buffer = new_contents.lines().map(str::to_string).collect();
        session.dirty = true;
        session
    }

    #[test]
    fn commit_sessions_writes_every_dirty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let session = session_for(path.clone(), "old\n", "new");

        commit_sessions(&[session]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn commit_sessions_leaves_non_dirty_sessions_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "unchanged\n").unwrap();
        let session = FileSession::load(&path).unwrap();
        assert!(!session.dirty);

        commit_sessions(&[session]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "unchanged\n");
    }

    #[test]
    fn commit_sessions_creates_a_brand_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fresh.txt");
        let session = FileSession::new_for_create(&path, "hello", None);

        commit_sessions(&[session]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    #[cfg(unix)]
    fn commit_sessions_refuses_to_write_through_a_symlinked_target() {
        use std::os::unix::fs::symlink;

        let dir = tempdir().unwrap();
        let real_path = dir.path().join("real.txt");
        let link_path = dir.path().join("link.txt");
        fs::write(&real_path, "old\n").unwrap();
        symlink(&real_path, &link_path).unwrap();

        let mut session = FileSession::load(&link_path).unwrap();
        session.buffer = vec!["new".to_string()];
        session.dirty = true;

        let error = commit_sessions(&[session]).unwrap_err();
        assert!(matches!(error, DriftPatchError::InvalidRequest { .. }));
        assert_eq!(fs::read_to_string(&real_path).unwrap(), "old\n");
    }

    #[test]
    fn commit_sessions_rolls_back_earlier_files_when_a_later_file_fails() {
        let dir = tempdir().unwrap();
        let a_path = dir.path().join("a.txt");
        let b_path = dir.path().join("b.txt");

        let session_a = session_for(a_path.clone(), "a-old\n", "a-new");
        let mut session_b = session_for(b_path.clone(), "b-old\n", "b-new");

        // Simulate a concurrent external write to b.txt after the
        // transaction loaded it, so the guard check trips on commit.
        fs::write(&b_path, "b-old-but-changed\n").unwrap();
        session_b.dirty = true;

        let error = commit_sessions(&[session_a, session_b]).unwrap_err();
        assert!(matches!(error, DriftPatchError::FileChangedDuringApply { .. }));
        assert_eq!(fs::read_to_string(&a_path).unwrap(), "a-old\n");
    }
}
