//! Stream endpoints for pipes
//!
//! [`Input`] wraps a consumable source, [`Output`] buffers what a transformer
//! writes and [`Execution`] is the materialized result handed to ready callbacks.

use crate::error::{PipeError, PipeResult};
use std::borrow::Cow;
use std::fmt::{self, Debug, Formatter};
use std::io::{self, Cursor, Read, Write};

/// Charset assumed when none is configured
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Source stream consumed at most once
///
/// Once [`Input::execution`], [`Input::read_to_string`] or [`Input::copy_to`]
/// has drained the stream, or [`Input::close`] was called, any further access
/// fails with [`PipeError::InputConsumed`].
pub struct Input {
    reader: Option<Box<dyn Read + Send>>,
    charset: String,
    source_as_bytes: bool,
}

impl Input {
    /// Wrap an arbitrary reader
    #[must_use]
    pub fn new<R>(reader: R, charset: impl Into<String>) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            reader: Some(Box::new(reader)),
            charset: charset.into(),
            source_as_bytes: true,
        }
    }

    /// Input over an owned byte buffer
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Cursor::new(bytes.into()), DEFAULT_CHARSET)
    }

    /// Input over text content
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut input = Self::new(Cursor::new(text.into().into_bytes()), DEFAULT_CHARSET);
        input.source_as_bytes = false;
        input
    }

    /// Charset used to decode the stream as text
    #[inline]
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Whether the source was provided as bytes rather than text
    #[inline]
    #[must_use]
    pub fn is_source_as_bytes(&self) -> bool {
        self.source_as_bytes
    }

    /// Whether the stream was already drained or closed
    #[inline]
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.reader.is_none()
    }

    /// Release the underlying reader without reading it
    pub fn close(&mut self) {
        self.reader = None;
    }

    /// Drain the stream into an [`Execution`]
    ///
    /// # Errors
    /// Returns [`PipeError::InputConsumed`] on a second call and
    /// [`PipeError::Io`] when the reader fails.
    pub fn execution(&mut self) -> PipeResult<Execution> {
        let mut reader = self.reader.take().ok_or(PipeError::InputConsumed)?;
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;
        Ok(Execution::new(content, self.charset.clone()))
    }

    /// Drain the stream as UTF-8 text
    ///
    /// # Errors
    /// Fails when consumed, on I/O failure or when the content is not valid UTF-8.
    pub fn read_to_string(&mut self) -> PipeResult<String> {
        let execution = self.execution()?;
        String::from_utf8(execution.into_bytes())
            .map_err(|e| PipeError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// Copy the whole stream into a writer, returning the number of bytes copied
    ///
    /// # Errors
    /// Fails when consumed or on I/O failure.
    pub fn copy_to<W: Write + ?Sized>(&mut self, writer: &mut W) -> PipeResult<u64> {
        let mut reader = self.reader.take().ok_or(PipeError::InputConsumed)?;
        Ok(io::copy(&mut reader, writer)?)
    }
}

impl Read for Input {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reader.as_mut() {
            Some(reader) => reader.read(buf),
            None => Err(io::Error::other(PipeError::InputConsumed)),
        }
    }
}

impl Debug for Input {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("charset", &self.charset)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

/// In-memory sink written by a transformer
#[derive(Debug, Clone)]
pub struct Output {
    buffer: Vec<u8>,
    charset: String,
}

impl Output {
    /// Create empty output using the given charset
    #[inline]
    #[must_use]
    pub fn new(charset: impl Into<String>) -> Self {
        Self {
            buffer: Vec::new(),
            charset: charset.into(),
        }
    }

    /// Bytes written so far
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of bytes written
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing was written
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Charset of the written content
    #[inline]
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Turn the written content into the input of the next stage
    #[must_use]
    pub fn into_input(self) -> Input {
        Input::new(Cursor::new(self.buffer), self.charset)
    }

    /// Freeze the written content
    #[must_use]
    pub fn into_execution(self) -> Execution {
        Execution::new(self.buffer, self.charset)
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new(DEFAULT_CHARSET)
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Fully materialized result of a pipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    content: Vec<u8>,
    charset: String,
}

impl Execution {
    /// Create execution from raw content
    #[inline]
    #[must_use]
    pub fn new(content: Vec<u8>, charset: impl Into<String>) -> Self {
        Self {
            content,
            charset: charset.into(),
        }
    }

    /// Raw content
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.content
    }

    /// Consume into raw content
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.content
    }

    /// Content decoded as text, replacing invalid sequences
    #[must_use]
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }

    /// Charset of the content
    #[inline]
    #[must_use]
    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Content length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the content is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Write the content to a sink
    ///
    /// # Errors
    /// Propagates I/O failures of the writer.
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> PipeResult<()> {
        writer.write_all(&self.content)?;
        Ok(())
    }

    /// Re-open the content as a fresh input
    #[must_use]
    pub fn to_input(&self) -> Input {
        Input::new(Cursor::new(self.content.clone()), self.charset.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_execution_reads_everything_once() {
        let mut input = Input::from_bytes(b"hello".to_vec());
        let execution = input.execution().unwrap();
        assert_eq!(execution.as_bytes(), b"hello");
        assert!(input.is_consumed());
        assert!(matches!(input.execution(), Err(PipeError::InputConsumed)));
    }

    #[test]
    fn closed_input_cannot_be_read() {
        let mut input = Input::from_text("body {}");
        input.close();
        let mut buf = [0u8; 4];
        assert!(input.read(&mut buf).is_err());
        assert!(matches!(input.read_to_string(), Err(PipeError::InputConsumed)));
    }

    #[test]
    fn text_input_reports_char_source() {
        assert!(!Input::from_text("a").is_source_as_bytes());
        assert!(Input::from_bytes(vec![1]).is_source_as_bytes());
    }

    #[test]
    fn read_to_string_rejects_invalid_utf8() {
        let mut input = Input::from_bytes(vec![0xff, 0xfe]);
        assert!(matches!(input.read_to_string(), Err(PipeError::Io(_))));
    }

    #[test]
    fn output_becomes_next_input() {
        let mut output = Output::default();
        output.write_all(b"abc").unwrap();
        assert_eq!(output.len(), 3);
        let mut input = output.into_input();
        assert_eq!(input.read_to_string().unwrap(), "abc");
    }

    #[test]
    fn execution_write_to_and_reopen() {
        let execution = Execution::new(b"x=1;".to_vec(), DEFAULT_CHARSET);
        let mut sink = Vec::new();
        execution.write_to(&mut sink).unwrap();
        assert_eq!(sink, b"x=1;");
        assert_eq!(execution.to_input().read_to_string().unwrap(), "x=1;");
        assert_eq!(execution.to_text(), "x=1;");
    }
}
