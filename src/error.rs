use std::path::PathBuf;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match err {
            FitError::UnknownModel(_) => 2,
            _ => 4,
        };
        AppError::new(code, err.to_string())
    }
}

/// Errors raised while resolving, running or persisting a fit.
///
/// Inside a job every variant except [`FitError::UserAbort`] ends the job as
/// failed; `UserAbort` ends it as aborted.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("Unknown BRDF model '{0}'")]
    UnknownModel(String),

    #[error("A fit is already running for '{0}'")]
    AlreadyRunning(String),

    #[error("Fit aborted by user")]
    UserAbort,

    #[error("Fit failed: {0}")]
    Failure(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid LTC table '{}': {reason}", path.display())]
    InvalidTable { path: PathBuf, reason: String },
}

impl FitError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FitError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the cooperative-cancellation signal.
    pub fn is_user_abort(&self) -> bool {
        matches!(self, FitError::UserAbort)
    }
}
