//! Process exit codes

use s3tree_core::{Error, ErrorKind};

/// Exit status of one command run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments or configuration, nothing was sent
    UsageError = 2,
    NetworkError = 3,
    NotFound = 5,
    /// Stopped by Ctrl-C
    Interrupted = 130,
}

impl ExitCode {
    pub fn from_error(error: &Error) -> Self {
        match (error.kind(), error) {
            (_, Error::Cancelled) => ExitCode::Interrupted,
            (_, Error::NotFound(_)) => ExitCode::NotFound,
            (ErrorKind::Configuration | ErrorKind::Transport, _) => ExitCode::UsageError,
            (ErrorKind::Storage, _) => ExitCode::NetworkError,
            (ErrorKind::Local, _) => ExitCode::GeneralError,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
