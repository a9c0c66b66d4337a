//! Application error type.

use std::path::PathBuf;

use thiserror::Error;
use vireo_graphics::GraphicsError;

/// Errors that end the application.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Graphics(#[from] GraphicsError),

    #[error("shader directory {path:?} is not readable: {source}")]
    ShaderDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to initialize logging: {0}")]
    Logger(#[from] log::SetLoggerError),
}

impl AppError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Graphics(GraphicsError::HeadsetNotConnected) => 2,
            Self::Graphics(_) => 1,
            Self::ShaderDir { .. } => 3,
            Self::Logger(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphics_errors_pass_through() {
        let err = AppError::from(GraphicsError::HeadsetNotConnected);
        assert_eq!(err.to_string(), "no headset connected");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn shader_dir_error_names_path() {
        let err = AppError::ShaderDir {
            path: PathBuf::from("missing"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("\"missing\""));
        assert_eq!(err.exit_code(), 3);
    }
}
