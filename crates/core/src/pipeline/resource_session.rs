//! Scoped ownership of opened reader and writer handles.
//!
//! Each guard closes its handle exactly once: explicitly through `finish`,
//! or on drop when an early return skips it.

use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

pub struct ReaderSession<'a> {
    reader: &'a mut dyn VideoReader,
    open: bool,
}

impl<'a> ReaderSession<'a> {
    /// Wraps a reader whose `open` already succeeded.
    pub fn new(reader: &'a mut dyn VideoReader) -> Self {
        Self { reader, open: true }
    }

    pub fn reader(&mut self) -> &mut dyn VideoReader {
        &mut *self.reader
    }

    pub fn finish(mut self) {
        self.close();
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.reader.close();
        }
    }
}

impl Drop for ReaderSession<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct WriterSession<'a> {
    writer: &'a mut dyn VideoWriter,
    open: bool,
}

impl<'a> WriterSession<'a> {
    /// Wraps a writer whose `open` already succeeded.
    pub fn new(writer: &'a mut dyn VideoWriter) -> Self {
        Self { writer, open: true }
    }

    pub fn writer(&mut self) -> &mut dyn VideoWriter {
        &mut *self.writer
    }

    /// Finalizes the output and reports whether that worked.
    pub fn finish(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.close()
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.writer.close()
    }
}

impl Drop for WriterSession<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to finalize output video: {e}");
        }
    }
}
