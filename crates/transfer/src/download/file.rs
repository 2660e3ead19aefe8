use crate::error::{ErrorKind, Result, redact};
use crate::job::DownloadJob;
use crate::summary::{format_bytes, format_duration};
use crate::transport::TransportHandle;
use bytes::BytesMut;
use exn::ResultExt;
use futures::{Stream, StreamExt};
use ldata_progress::{ProgressHandle, Unit};
use std::path::Path;
use std::time::Instant;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// What a download worker needs, shared by every job of one transfer.
#[derive(Clone)]
pub(crate) struct Worker {
    pub transport: TransportHandle,
    pub progress: ProgressHandle,
    pub unit: Unit,
    pub chunk_size: usize,
    pub verbose: bool,
}

impl Worker {
    /// Fetch one file into place. Returns the number of bytes written.
    ///
    /// The body lands in a hidden temporary file next to the destination and
    /// is renamed over it only once complete. Returning early, with an error
    /// or by being aborted, deletes the temporary file.
    pub async fn run(self, job: DownloadJob) -> Result<u64> {
        let slot = self.progress.acquire_free_slot().await.or_raise(|| ErrorKind::Progress)?;
        let started = Instant::now();
        let response = self.transport.get(&job.source).await?;
        let Some(length) = response.content_length else {
            exn::bail!(ErrorKind::MissingContentLength(redact(&job.source).to_string()));
        };
        let name = display_name(&job.destination);
        slot.set(length, name.clone());
        if self.verbose {
            self.write(format!("Downloading {name} ({})", format_bytes(length)))?;
        }

        let parent = job
            .destination
            .parent()
            .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidDestination(job.destination.clone())))?;
        let (file, temp_path) = tempfile::Builder::new()
            .prefix(".ldata-")
            .suffix(".partial")
            .tempfile_in(parent)
            .or_raise(|| ErrorKind::Io(parent.to_path_buf()))?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let written = write_chunked(&mut file, response.body, self.chunk_size, &temp_path, |n| {
            slot.update(n);
            match self.unit {
                Unit::Bytes => self.progress.update_total_progress(n).or_raise(|| ErrorKind::Progress),
                Unit::Files => Ok(()),
            }
        })
        .await?;
        if written != length {
            exn::bail!(ErrorKind::Network(format!(
                "{}: expected {length} bytes, received {written}",
                redact(&job.source)
            )));
        }
        file.flush().await.or_raise(|| ErrorKind::Io(temp_path.to_path_buf()))?;
        drop(file);
        temp_path.persist(&job.destination).or_raise(|| ErrorKind::Io(job.destination.clone()))?;

        if self.unit == Unit::Files {
            self.progress.update_total_progress(1).or_raise(|| ErrorKind::Progress)?;
        }
        tracing::debug!(path = %job.destination.display(), bytes = written, "downloaded");
        if self.verbose {
            self.write(format!(
                "Finished {name} ({} in {})",
                format_bytes(written),
                format_duration(started.elapsed())
            ))?;
        }
        Ok(written)
    }

    fn write(&self, line: String) -> Result<()> {
        self.progress.write(line).or_raise(|| ErrorKind::Progress)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name().unwrap_or(path.as_os_str()).to_string_lossy().into_owned()
}

/// Copy `body` into `writer` in writes of exactly `chunk_size` bytes (the
/// last one may be shorter), calling `on_chunk` after each write. An error
/// from `on_chunk` stops the copy.
pub(crate) async fn write_chunked<W, S>(
    writer: &mut W,
    body: S,
    chunk_size: usize,
    path: &Path,
    mut on_chunk: impl FnMut(u64) -> Result<()>,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
    S: Stream<Item = Result<bytes::Bytes>>,
{
    let chunk_size = chunk_size.max(1);
    let mut body = std::pin::pin!(body);
    let mut buffer = BytesMut::with_capacity(chunk_size);
    let mut written = 0;
    while let Some(bytes) = body.next().await {
        buffer.extend_from_slice(&bytes?);
        while buffer.len() >= chunk_size {
            let chunk = buffer.split_to(chunk_size);
            writer.write_all(&chunk).await.or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
            written += chunk.len() as u64;
            on_chunk(chunk.len() as u64)?;
        }
    }
    if !buffer.is_empty() {
        writer.write_all(&buffer).await.or_raise(|| ErrorKind::Io(path.to_path_buf()))?;
        written += buffer.len() as u64;
        on_chunk(buffer.len() as u64)?;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rstest::rstest;

    const MIB: usize = 1024 * 1024;

    fn body(total: usize, read_size: usize) -> impl Stream<Item = Result<Bytes>> {
        let reads: Vec<Result<Bytes>> =
            (0..total).step_by(read_size).map(|start| Ok(Bytes::from(vec![7u8; read_size.min(total - start)]))).collect();
        futures::stream::iter(reads)
    }

    #[rstest]
    #[case(10 * MIB, 5 * MIB, 64 * 1024, 2)]
    #[case(10 * MIB, 5 * MIB, 3 * MIB, 2)]
    #[case(11 * MIB, 5 * MIB, MIB, 3)]
    #[case(10, 5 * MIB, 4, 1)]
    #[case(0, 5 * MIB, 1, 0)]
    #[tokio::test]
    async fn test_chunk_writes(
        #[case] total: usize,
        #[case] chunk_size: usize,
        #[case] read_size: usize,
        #[case] expected_writes: usize,
    ) {
        let mut out = Vec::new();
        let mut writes = Vec::new();
        let written = write_chunked(&mut out, body(total, read_size), chunk_size, Path::new("out"), |n| {
            writes.push(n);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(written, total as u64);
        assert_eq!(out.len(), total);
        assert_eq!(writes.len(), expected_writes);
        assert_eq!(writes.iter().sum::<u64>(), total as u64);
    }

    #[tokio::test]
    async fn test_body_error_stops_writing() {
        let reads = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(exn::Exn::from(ErrorKind::Network("reset".to_string()))),
        ];
        let mut out = Vec::new();
        let err = write_chunked(&mut out, futures::stream::iter(reads), 2, Path::new("out"), |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert_eq!(out, b"ab");
    }

    #[tokio::test]
    async fn test_progress_failure_stops_writing() {
        let mut out = Vec::new();
        let err = write_chunked(&mut out, body(10, 10), 4, Path::new("out"), |_| {
            exn::bail!(ErrorKind::Progress)
        })
        .await
        .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Progress));
        assert_eq!(out.len(), 4);
    }
}
