use crate::context::MAX_PARTS;
use crate::error::{ErrorKind, Result};
use crate::job::UploadJob;
use crate::summary::{format_bytes, format_duration};
use crate::transport::TransportHandle;
use bytes::Bytes;
use exn::ResultExt;
use ldata_progress::{ProgressHandle, SlotGuard};
use ldata_remote::{CompletedPart, RemoteHandle};
use std::path::Path;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};

/// Effective part size for a file of `size` bytes: the preferred size, raised
/// so the file never needs more than [`MAX_PARTS`] parts.
pub(crate) fn part_size_for(size: u64, preferred: u64) -> u64 {
    preferred.max(size.div_ceil(MAX_PARTS)).max(1)
}

/// One byte range of a multipart upload. Part numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Part {
    pub number: usize,
    pub offset: u64,
    pub len: u64,
}

/// Split `size` bytes into consecutive parts of `part_size` (the last one may
/// be shorter). An empty file is still one (empty) part.
pub(crate) fn plan_parts(size: u64, part_size: u64) -> Vec<Part> {
    let part_size = part_size.max(1);
    let count = size.div_ceil(part_size).max(1);
    (0..count)
        .map(|index| {
            let offset = index * part_size;
            Part {
                number: index as usize + 1,
                offset,
                len: part_size.min(size - offset.min(size)),
            }
        })
        .collect()
}

/// Content type declared for an upload, from the file extension. Unknown
/// extensions are left for the server to decide.
pub(crate) fn content_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match extension.as_str() {
        "txt" | "log" | "fastq" | "fq" | "fasta" | "fa" | "sam" | "vcf" | "bed" | "gtf" | "gff" => "text/plain",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "json" => "application/json",
        "html" | "htm" => "text/html",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gz" => "application/gzip",
        "zip" => "application/zip",
        "tar" => "application/x-tar",
        "bam" | "cram" | "bin" => "application/octet-stream",
        _ => return None,
    };
    Some(content_type)
}

/// What an upload worker needs, shared by every job of one transfer.
#[derive(Clone)]
pub(crate) struct Worker {
    pub remote: RemoteHandle,
    pub transport: TransportHandle,
    pub progress: ProgressHandle,
    pub part_size: u64,
    pub multipart_threshold: u64,
    pub verbose: bool,
}

impl Worker {
    /// Upload one file. Returns the number of bytes sent.
    pub async fn run(self, job: UploadJob) -> Result<u64> {
        let slot = self.progress.acquire_free_slot().await.or_raise(|| ErrorKind::Progress)?;
        let started = Instant::now();
        let name = job.destination.name().to_string();
        slot.set(job.size, name.clone());
        if self.verbose {
            self.write(format!("Uploading {name} ({})", format_bytes(job.size)))?;
        }

        let parts = match job.size > self.multipart_threshold {
            true => plan_parts(job.size, part_size_for(job.size, self.part_size)),
            false => plan_parts(job.size, job.size),
        };
        let session = self
            .remote
            .start_upload(&job.destination, parts.len(), content_type_for(&job.source))
            .await
            .or_raise(|| ErrorKind::Exchange)?;
        let mut file = File::open(&job.source).await.or_raise(|| ErrorKind::InvalidSource(job.source.clone()))?;

        match session.upload_id {
            None => {
                let Some(url) = session.urls.first() else {
                    exn::bail!(ErrorKind::Exchange);
                };
                let whole = Part {
                    number: 1,
                    offset: 0,
                    len: job.size,
                };
                let body = self.read_part(&mut file, &job, whole).await?;
                self.transport.put(url, body).await?;
                self.advance(&slot, job.size)?;
            },
            Some(upload_id) => {
                if session.urls.len() != parts.len() {
                    tracing::error!(
                        requested = parts.len(),
                        received = session.urls.len(),
                        "upload session has the wrong number of part URLs"
                    );
                    exn::bail!(ErrorKind::Exchange);
                }
                let mut completed = Vec::with_capacity(parts.len());
                for (part, url) in parts.iter().zip(&session.urls) {
                    let body = self.read_part(&mut file, &job, *part).await?;
                    let etag = self
                        .transport
                        .put(url, body)
                        .await?
                        .ok_or_else(|| exn::Exn::from(ErrorKind::MissingEtag(part.number)))?;
                    completed.push(CompletedPart {
                        etag,
                        part_number: part.number,
                    });
                    self.advance(&slot, part.len)?;
                }
                self.remote
                    .end_upload(&job.destination, &upload_id, &completed)
                    .await
                    .or_raise(|| ErrorKind::Exchange)?;
            },
        }

        tracing::debug!(path = %job.destination, bytes = job.size, parts = parts.len(), "uploaded");
        if self.verbose {
            self.write(format!(
                "Finished {name} ({} in {})",
                format_bytes(job.size),
                format_duration(started.elapsed())
            ))?;
        }
        Ok(job.size)
    }

    async fn read_part(&self, file: &mut File, job: &UploadJob, part: Part) -> Result<Bytes> {
        let len = usize::try_from(part.len).or_raise(|| ErrorKind::InvalidSource(job.source.clone()))?;
        let mut buffer = vec![0; len];
        file.seek(SeekFrom::Start(part.offset))
            .await
            .or_raise(|| ErrorKind::Io(job.source.clone()))?;
        file.read_exact(&mut buffer).await.or_raise(|| ErrorKind::Io(job.source.clone()))?;
        Ok(Bytes::from(buffer))
    }

    /// Upload sizes are always known up front, so the aggregate counts bytes.
    fn advance(&self, slot: &SlotGuard, bytes: u64) -> Result<()> {
        slot.update(bytes);
        self.progress.update_total_progress(bytes).or_raise(|| ErrorKind::Progress)
    }

    fn write(&self, line: String) -> Result<()> {
        self.progress.write(line).or_raise(|| ErrorKind::Progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MIB;
    use rstest::rstest;

    #[rstest]
    #[case("reads/sample_1.fastq", Some("text/plain"))]
    #[case("table.CSV", Some("text/csv"))]
    #[case("out/aligned.bam", Some("application/octet-stream"))]
    #[case("reads.fastq.gz", Some("application/gzip"))]
    #[case("notes", None)]
    #[case("weird.xyz", None)]
    fn test_content_type_from_extension(#[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(content_type_for(Path::new(path)), expected);
    }

    #[test]
    fn test_twelve_mib_in_five_mib_parts() {
        let parts = plan_parts(12 * MIB, 5 * MIB);
        let lens: Vec<_> = parts.iter().map(|p| p.len / MIB).collect();
        let numbers: Vec<_> = parts.iter().map(|p| p.number).collect();
        assert_eq!(lens, [5, 5, 2]);
        assert_eq!(numbers, [1, 2, 3]);
        assert_eq!(parts[2].offset, 10 * MIB);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(5 * MIB, 1)]
    #[case(5 * MIB + 1, 2)]
    fn test_part_count(#[case] size: u64, #[case] expected: usize) {
        let parts = plan_parts(size, 5 * MIB);
        assert_eq!(parts.len(), expected);
        assert_eq!(parts.iter().map(|p| p.len).sum::<u64>(), size);
    }

    #[rstest]
    #[case(12 * MIB, 5 * MIB, 5 * MIB)]
    #[case(100_000 * MIB, 5 * MIB, 10 * MIB)]
    #[case(100_001 * MIB, 5 * MIB, (100_001 * MIB).div_ceil(10_000))]
    #[case(0, 5 * MIB, 5 * MIB)]
    fn test_part_size_respects_part_ceiling(#[case] size: u64, #[case] preferred: u64, #[case] expected: u64) {
        let part_size = part_size_for(size, preferred);
        assert_eq!(part_size, expected);
        assert!(plan_parts(size, part_size).len() as u64 <= MAX_PARTS);
    }
}
