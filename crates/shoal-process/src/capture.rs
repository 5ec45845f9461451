//! Pipe draining into size-capped backing files, and summary read-back.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::error::{ProcessError, ProcessResult, Stream};

/// Capacity of the buffered writer wrapped around each backing file.
pub(crate) const BACKING_WRITER_CAPACITY: usize = 4096;

/// What a drain task observed before it stopped.
#[derive(Debug, Default)]
pub(crate) struct DrainOutcome {
    /// Bytes of process output written to the backing file, excluding the
    /// sentinel.
    pub(crate) bytes_written: u64,
    /// Whether the cap was exceeded and the sentinel appended.
    pub(crate) capped: bool,
    /// A pipe read error other than end-of-stream, if one occurred.
    pub(crate) read_error: Option<std::io::Error>,
}

/// Settings for one drain task.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DrainLimits {
    pub(crate) backing_max_bytes: u64,
    pub(crate) read_chunk_bytes: usize,
}

/// Copy `reader` into `file` until end-of-stream, a read error, or the cap.
///
/// Every chunk is flushed as soon as it is written. The chunk that crosses
/// the cap is cut at the cap, the sentinel is appended and the reader is
/// dropped, closing this end of the pipe. Returns the underlying file so the
/// caller can sync and close it once the process has exited.
pub(crate) async fn drain<R>(
    stream: Stream,
    mut reader: R,
    file: File,
    limits: DrainLimits,
    sentinel: String,
) -> ProcessResult<(File, DrainOutcome)>
where
    R: AsyncRead + Unpin,
{
    let mut writer = BufWriter::with_capacity(BACKING_WRITER_CAPACITY, file);
    let mut buf = vec![0u8; limits.read_chunk_bytes.max(1)];
    let mut outcome = DrainOutcome::default();
    let write_err = |source| ProcessError::Write { stream, source };

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(stream = %stream, error = %e, "Error reading from pipe");
                outcome.read_error = Some(e);
                break;
            },
        };

        let remaining = limits
            .backing_max_bytes
            .saturating_sub(outcome.bytes_written);
        let keep = usize::try_from(remaining).map_or(n, |r| n.min(r));

        if let Some(chunk) = buf.get(..keep) {
            writer.write_all(chunk).await.map_err(write_err)?;
        }
        outcome.bytes_written = outcome
            .bytes_written
            .saturating_add(u64::try_from(keep).unwrap_or(u64::MAX));

        if keep < n {
            warn!(
                stream = %stream,
                max_bytes = limits.backing_max_bytes,
                "Process output exceeded the backing file cap, stopping"
            );
            writer
                .write_all(sentinel.as_bytes())
                .await
                .map_err(write_err)?;
            writer.flush().await.map_err(write_err)?;
            outcome.capped = true;
            break;
        }

        writer.flush().await.map_err(write_err)?;
    }

    drop(reader);
    writer.flush().await.map_err(write_err)?;
    debug!(
        stream = %stream,
        bytes = outcome.bytes_written,
        capped = outcome.capped,
        "Drain finished"
    );
    Ok((writer.into_inner(), outcome))
}

/// Bounded excerpt of a backing file and whether the file holds more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Summary {
    pub(crate) text: String,
    pub(crate) truncated: bool,
}

/// Read at most `max_bytes` from the start of `path`.
///
/// `truncated` compares the file's full size against `max_bytes`, not the
/// backing cap.
pub(crate) async fn summarize(
    stream: Stream,
    path: &Path,
    max_bytes: usize,
) -> ProcessResult<Summary> {
    let err = |source| ProcessError::Summary {
        stream,
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).await.map_err(err)?;
    let len = file.metadata().await.map_err(err)?.len();

    let mut bytes = Vec::with_capacity(max_bytes.min(usize::try_from(len).unwrap_or(max_bytes)));
    file.take(u64::try_from(max_bytes).unwrap_or(u64::MAX))
        .read_to_end(&mut bytes)
        .await
        .map_err(err)?;

    let truncated = len > u64::try_from(max_bytes).unwrap_or(u64::MAX);
    let kept = if truncated { complete_prefix(&bytes) } else { &bytes };
    Ok(Summary {
        text: String::from_utf8_lossy(kept).into_owned(),
        truncated,
    })
}

/// `bytes` without a trailing UTF-8 sequence that is missing its
/// continuation bytes.
fn complete_prefix(bytes: &[u8]) -> &[u8] {
    let tail_from = bytes.len().saturating_sub(3);
    for start in (tail_from..bytes.len()).rev() {
        match std::str::from_utf8(&bytes[start..]) {
            Ok(_) => return bytes,
            Err(e) if e.valid_up_to() == 0 && e.error_len().is_none() => return &bytes[..start],
            Err(_) => {},
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_prefix_drops_split_character() {
        let text = "naïve €";
        let bytes = text.as_bytes();
        assert_eq!(complete_prefix(bytes), bytes);
        // "na" plus the first byte of "ï"
        assert_eq!(complete_prefix(&bytes[..3]), b"na");
        // the euro sign starts at byte 7 and is three bytes long
        assert_eq!(complete_prefix(&bytes[..9]), &bytes[..7]);
        assert_eq!(complete_prefix(b"ok\xff"), b"ok\xff");
        assert_eq!(complete_prefix(b""), b"");
    }

    #[tokio::test]
    async fn test_summary_cut_keeps_whole_characters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stdout");
        std::fs::write(&path, "aé€".as_bytes()).unwrap();

        let summary = summarize(Stream::Stdout, &path, 2).await.unwrap();
        assert_eq!(summary.text, "a");
        assert!(summary.truncated);

        let summary = summarize(Stream::Stdout, &path, 5).await.unwrap();
        assert_eq!(summary.text, "aé");
        assert!(summary.truncated);

        let summary = summarize(Stream::Stdout, &path, 6).await.unwrap();
        assert_eq!(summary.text, "aé€");
        assert!(!summary.truncated);
    }

    fn limits(backing_max_bytes: u64, read_chunk_bytes: usize) -> DrainLimits {
        DrainLimits {
            backing_max_bytes,
            read_chunk_bytes,
        }
    }

    async fn drain_bytes(input: &[u8], limits: DrainLimits) -> (Vec<u8>, DrainOutcome) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        let file = File::create(&path).await.unwrap();
        let (file, outcome) = drain(Stream::Stdout, input, file, limits, "STOP".into())
            .await
            .unwrap();
        file.sync_all().await.unwrap();
        drop(file);
        (std::fs::read(&path).unwrap(), outcome)
    }

    #[tokio::test]
    async fn test_drain_under_cap() {
        let (written, outcome) = drain_bytes(b"hello world", limits(100, 4)).await;
        assert_eq!(written, b"hello world");
        assert_eq!(outcome.bytes_written, 11);
        assert!(!outcome.capped);
    }

    #[tokio::test]
    async fn test_drain_exactly_at_cap_has_no_sentinel() {
        let (written, outcome) = drain_bytes(b"0123456789", limits(10, 3)).await;
        assert_eq!(written, b"0123456789");
        assert!(!outcome.capped);
    }

    #[tokio::test]
    async fn test_drain_cuts_crossing_chunk_and_appends_sentinel() {
        let (written, outcome) = drain_bytes(b"0123456789abcdef", limits(10, 4)).await;
        assert_eq!(written, b"0123456789STOP");
        assert_eq!(outcome.bytes_written, 10);
        assert!(outcome.capped);
    }

    #[tokio::test]
    async fn test_summarize_reports_truncation_against_summary_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");
        std::fs::write(&path, b"abcdefgh").unwrap();

        let short = summarize(Stream::Stdout, &path, 3).await.unwrap();
        assert_eq!(short.text, "abc");
        assert!(short.truncated);

        let whole = summarize(Stream::Stdout, &path, 8).await.unwrap();
        assert_eq!(whole.text, "abcdefgh");
        assert!(!whole.truncated);

        let roomy = summarize(Stream::Stdout, &path, 2048).await.unwrap();
        assert_eq!(roomy.text, "abcdefgh");
        assert!(!roomy.truncated);
    }

    #[tokio::test]
    async fn test_summarize_missing_file_is_setup_error() {
        let err = summarize(Stream::Stderr, Path::new("/nonexistent/stderr"), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Summary { stream: Stream::Stderr, .. }));
    }
}
