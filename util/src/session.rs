//! Session management
//!
//! A session is a timestamped directory collecting the log file and any
//! artefacts saved during one execution. Creating a [`Session`] also sets the
//! global session epoch used by the logger's elapsed-seconds timestamps.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use log::{debug, trace, warn};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

// Internal imports
use crate::time;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

static SESSION_ROOT: OnceCell<PathBuf> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// A chrono format string which displays a timestamp. See
/// https://docs.rs/chrono/latest/chrono/format/strftime/index.html for more
/// information.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A struct storing information about the current session
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error(
        "Cannot initialise the session epoch, have you already initialised \
         the session? (conquer_once error: {0})"
    )]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the epoch time, did you forget to initialise the session?")]
    CannotGetEpoch,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session within the given directory.
    ///
    /// This will create a new session directory named
    /// `{exec_name}_{timestamp}` under `sessions_dir`, which is taken
    /// relative to the current working directory.
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        // Set the session epoch
        match SESSION_EPOCH.try_init_once(Utc::now) {
            Ok(_) => (),
            Err(e) => return Err(SessionError::CannotInitEpoch(e)),
        };

        // Format the session epoch as a timestamp
        let timestamp = match SESSION_EPOCH.get() {
            Some(e) => e.format(TIMESTAMP_FORMAT),
            None => return Err(SessionError::CannotGetEpoch),
        };

        // Create the session path
        let mut path = PathBuf::from(sessions_dir);
        path.push(format!("{}_{}", exec_name, timestamp));

        // Create the directory
        match fs::create_dir_all(path.clone()) {
            Ok(_) => (),
            Err(e) => return Err(SessionError::CannotCreateDir(e)),
        };

        // Record the root for artefact saving
        SESSION_ROOT.init_once(|| path.clone());

        // Create the log file path
        let mut log_file_path = path.clone();
        log_file_path.push(format!("{}.log", exec_name));

        // Build the session struct
        Ok(Session {
            session_root: path,
            log_file_path,
        })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// If no session has been initialised yet this returns `0.0`, so that
/// logging remains usable outside a full session (for example in tests).
pub fn get_elapsed_seconds() -> f64 {
    match SESSION_EPOCH.get() {
        Some(e) => {
            let elapsed = Utc::now() - *e;
            time::duration_to_seconds(elapsed).unwrap_or(f64::NAN)
        }
        None => 0.0,
    }
}

/// Return a reference to the session's epoch, if a session is active.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}

/// Save a serialisable value as a JSON artefact in the session directory.
///
/// `rel_path` is a path relative to the session root; the elapsed session
/// time is inserted into the file name so that repeated saves do not
/// overwrite each other. When no session is active the value is dropped
/// with a debug-level record, so library code may call this unconditionally.
pub fn save_with_timestamp<T: Serialize>(rel_path: &str, value: &T) {
    let root = match SESSION_ROOT.get() {
        Some(r) => r,
        None => {
            debug!("No active session, not saving \"{}\"", rel_path);
            return;
        }
    };

    // Insert the elapsed-seconds stamp between the file stem and extension
    let rel = PathBuf::from(rel_path);
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("artefact"));
    let stamped = match rel.extension() {
        Some(ext) => format!(
            "{}_{:012.6}.{}",
            stem,
            get_elapsed_seconds(),
            ext.to_string_lossy()
        ),
        None => format!("{}_{:012.6}", stem, get_elapsed_seconds()),
    };

    let mut path = root.clone();
    path.push(&rel);
    path.set_file_name(stamped);

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Could not create artefact directory {:?}: {}", parent, e);
            return;
        }
    }

    match serde_json::to_string_pretty(value) {
        Ok(json) => match fs::write(&path, json) {
            Ok(_) => trace!("Saved artefact {:?}", path),
            Err(e) => warn!("Could not write artefact {:?}: {}", path, e),
        },
        Err(e) => warn!("Could not serialise artefact \"{}\": {}", rel_path, e),
    }
}
