//! Streaming, early-terminating scan of a single (possibly compressed) log file
use super::algorithms::SearchCriteria;
use super::{SearchPhase, TimeWindow};
use crate::error::{LogSearchError, Result};
use crate::timestamp::TimestampCodec;
use async_compression::tokio::bufread::{GzipDecoder, LzmaDecoder, XzDecoder};
use async_zip::base::read::seek::ZipFileReader;
use log::trace;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::sync::CancellationToken;

const BUFFER_CAPACITY: usize = 64 * 1024;

/// Container format, chosen from the file extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Xz,
    Lzma,
    /// Every member is scanned, in archive order.
    Zip,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gz") => Compression::Gzip,
            Some(ext) if ext.eq_ignore_ascii_case("xz") => Compression::Xz,
            Some(ext) if ext.eq_ignore_ascii_case("lzma") => Compression::Lzma,
            Some(ext) if ext.eq_ignore_ascii_case("zip") => Compression::Zip,
            _ => Compression::None,
        }
    }
}

type LineReader = Pin<Box<dyn AsyncBufRead + Send>>;

/// Scans one file line by line and keeps the in-window lines that match.
///
/// Files are assumed to be appended in time order: the first line stamped
/// after the window end stops the scan, and anything after it is never read.
/// Zip members are treated as separate files, each with its own cutoff.
#[derive(Debug, Clone, Default)]
pub struct StreamSearcher {
    codec: TimestampCodec,
    read_timeout: Option<Duration>,
}

impl StreamSearcher {
    pub fn new(codec: TimestampCodec) -> Self {
        Self {
            codec,
            read_timeout: None,
        }
    }

    /// Fail a read that makes no progress for `timeout`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn codec(&self) -> &TimestampCodec {
        &self.codec
    }

    /// Return the lines of `path` stamped inside `window` that match `criteria`.
    ///
    /// Lines without a parseable prefix are skipped. Bytes that are not valid
    /// UTF-8 are replaced with U+FFFD in the returned lines. I/O and
    /// decompression errors end the scan with [`LogSearchError::FileProcessing`].
    pub async fn search_file(
        &self,
        path: &Path,
        window: TimeWindow,
        criteria: &SearchCriteria,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LogSearchError::Cancelled {
                phase: SearchPhase::Searching,
            }),
            scanned = self.scan(path, window, criteria) => {
                scanned.map_err(|source| LogSearchError::FileProcessing {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    async fn scan(
        &self,
        path: &Path,
        window: TimeWindow,
        criteria: &SearchCriteria,
    ) -> io::Result<Vec<String>> {
        let file = BufReader::with_capacity(BUFFER_CAPACITY, File::open(path).await?);
        let mut matches = Vec::new();

        let mut reader: LineReader = match Compression::from_path(path) {
            Compression::None => Box::pin(file),
            Compression::Gzip => {
                let mut decoder = GzipDecoder::new(file);
                decoder.multiple_members(true);
                Box::pin(BufReader::new(decoder))
            }
            Compression::Xz => Box::pin(BufReader::new(XzDecoder::new(file))),
            Compression::Lzma => Box::pin(BufReader::new(LzmaDecoder::new(file))),
            Compression::Zip => {
                self.scan_zip(file, path, window, criteria, &mut matches)
                    .await?;
                return Ok(matches);
            }
        };

        self.scan_lines(&mut reader, path, window, criteria, &mut matches)
            .await?;
        Ok(matches)
    }

    async fn scan_zip(
        &self,
        file: BufReader<File>,
        path: &Path,
        window: TimeWindow,
        criteria: &SearchCriteria,
        matches: &mut Vec<String>,
    ) -> io::Result<()> {
        let mut archive = ZipFileReader::with_tokio(file).await.map_err(zip_error)?;
        let members = archive.file().entries().len();

        for index in 0..members {
            let entry = archive
                .reader_without_entry(index)
                .await
                .map_err(zip_error)?;
            let mut reader = Box::pin(BufReader::new(entry.compat()));
            self.scan_lines(&mut reader, path, window, criteria, matches)
                .await?;
        }
        Ok(())
    }

    async fn scan_lines<R>(
        &self,
        reader: &mut R,
        path: &Path,
        window: TimeWindow,
        criteria: &SearchCriteria,
        matches: &mut Vec<String>,
    ) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        let mut buf = Vec::with_capacity(256);
        let mut lines_read = 0usize;

        loop {
            buf.clear();
            if self.read_line(reader, &mut buf).await? == 0 {
                break;
            }
            lines_read += 1;

            let line = String::from_utf8_lossy(trim_newline(&buf));
            let Some(stamp) = self.codec.parse(&line) else {
                continue;
            };

            if stamp > window.end_ms() {
                trace!(
                    "{}: passed window end after {} lines",
                    path.display(),
                    lines_read
                );
                break;
            }

            if stamp >= window.start_ms() && criteria.is_match(&line) {
                matches.push(line.into_owned());
            }
        }

        Ok(())
    }

    async fn read_line<R>(&self, reader: &mut R, buf: &mut Vec<u8>) -> io::Result<usize>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, reader.read_until(b'\n', buf))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))?,
            None => reader.read_until(b'\n', buf).await,
        }
    }
}

fn zip_error(e: async_zip::error::ZipError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
