use tessera_engine::TesseraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] TesseraError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Engine(e) => e.exit_code(),
            AppError::Io(_) | AppError::Logging(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_keep_their_exit_code() {
        let err = AppError::from(TesseraError::usage("missing page"));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.to_string(), "usage error: missing page");

        let err = AppError::Logging("already set".to_string());
        assert_eq!(err.exit_code(), 1);
    }
}
