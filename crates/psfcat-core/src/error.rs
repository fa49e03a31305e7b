use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PsfcatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Schema mismatch in {artifact}: {detail}")]
    SchemaMismatch { artifact: String, detail: String },

    #[error("Empty input: {0}")]
    EmptyInput(&'static str),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("External tool failed: {0}")]
    ExternalTool(String),

    #[error("Gave up appending to blacklist {} after {attempts} attempts", path.display())]
    BlacklistExhausted { path: PathBuf, attempts: u32 },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PsfcatError>;
