use crate::config::Slot;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The input device could not be found, opened or configured.
    #[error("audio device error: {0}")]
    Device(String),

    #[error("slot {0} is already recording")]
    AlreadyRecording(Slot),

    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("cannot decode {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("plot rendering failed: {0}")]
    Render(String),

    #[error("capture worker for slot {0} panicked")]
    WorkerPanicked(Slot),
}

impl Error {
    pub(crate) fn device(err: impl std::fmt::Display) -> Self {
        Error::Device(err.to_string())
    }

    /// Per-file analysis failures are skipped rather than aborting a plot.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::FileNotFound(_) | Error::Decode { .. })
    }
}

/// Maps hound's write-side errors onto the I/O taxonomy.
impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => Error::Io(io),
            other => Error::Io(std::io::Error::other(other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hound_io_errors_become_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: Error = hound::Error::IoError(io).into();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn only_per_file_errors_are_recoverable() {
        assert!(Error::FileNotFound(PathBuf::from("a.wav")).is_recoverable());
        assert!(
            Error::Decode {
                path: PathBuf::from("a.wav"),
                reason: "bad header".into()
            }
            .is_recoverable()
        );
        assert!(!Error::Device("no mic".into()).is_recoverable());
        assert!(!Error::AlreadyRecording(Slot::One).is_recoverable());
    }
}
