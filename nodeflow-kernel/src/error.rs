use nodeflow_contracts::FrameError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}
