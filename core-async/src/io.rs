//! Async byte stream traits.
//!
//! Audio sources handed to a voice binding are plain [`AsyncRead`] pipes
//! (typically a child process stdout).

pub use tokio::io::{
    empty, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
    BufReader, Empty, ReadBuf,
};
