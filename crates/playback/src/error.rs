use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Prepare error: {0}")]
    PrepareError(String),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Seek error: chapter {chapter_index} at {offset_ms}ms")]
    SeekError { chapter_index: usize, offset_ms: u64 },

    #[error("Engine not prepared")]
    NotPrepared,
}

pub type EngineResult<T> = Result<T, EngineError>;
