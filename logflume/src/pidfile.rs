// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! PID file handling: a 0600 file under an exclusive lock for as long as
//! the daemon lives. A second instance finds the lock held and reports the
//! holder's PID. The lock rides on the open file description, so it
//! survives the daemonization fork.

use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PidFileError {
    #[error("already running with PID {0}")]
    AlreadyRunning(u32),
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub struct PidFile {
    lock: Flock<File>,
    path: PathBuf,
}

impl PidFile {
    /// Opens (creating if needed) and locks the PID file. A held lock
    /// means another instance is alive; its PID is read back out.
    pub fn open(path: &Path) -> Result<PidFile, PidFileError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o600)
            .open(path)
            .map_err(|source| PidFileError::Io {
                path: path.display().to_string(),
                source,
            })?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => Ok(PidFile {
                lock,
                path: path.to_owned(),
            }),
            Err((mut file, _)) => {
                let mut text = String::new();
                let _ = file.read_to_string(&mut text);
                Err(PidFileError::AlreadyRunning(
                    text.trim().parse().unwrap_or(0),
                ))
            }
        }
    }

    /// Records the current PID. Called after daemonization so the file
    /// holds the daemon's PID, not the launcher's.
    pub fn write_pid(&mut self) -> io::Result<()> {
        self.lock.set_len(0)?;
        self.lock.seek(SeekFrom::Start(0))?;
        writeln!(&mut *self.lock, "{}", std::process::id())
    }

    /// Removes the PID file on clean exit.
    pub fn remove(self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
