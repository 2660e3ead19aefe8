//! Local to remote transfers.

mod file;
mod walk;

use self::file::Worker;
use self::walk::walk;
use crate::context::{Options, TransferContext, TransferOutcome};
use crate::error::{ErrorKind, Result};
use crate::job::{UploadJob, dedupe};
use crate::pool;
use crate::summary::TransferSummary;
use exn::ResultExt;
use ldata_progress::Unit;
use ldata_remote::RemotePath;
use ldata_remote::error::ErrorKind as RemoteErrorKind;
use std::path::Path;
use std::time::Instant;
use tokio::fs;

/// Upload `src` to `dest`.
///
/// If `dest` is an existing remote directory the upload is nested under it
/// as `dest/<name>`; a directory source whose `dest` ends with `/` instead
/// has its contents placed directly in `dest`. Anything else, including a
/// `dest` that does not exist yet, is written to `dest` as given.
///
/// Whether a remote file of the same name gets replaced is up to the server.
///
/// # Examples
///
/// ```no_run
/// use ldata_transfer::{Options, TransferContext, upload};
/// use std::path::Path;
///
/// # async fn example(ctx: TransferContext) -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = upload(&ctx, Path::new("reads"), &"latch:///inputs/".parse()?, Options::default()).await?;
/// println!("{}: {}", outcome.destination, outcome.summary);
/// # Ok(())
/// # }
/// ```
#[tracing::instrument(skip_all, fields(src = %src.display(), dest = %dest))]
pub async fn upload(
    ctx: &TransferContext,
    src: &Path,
    dest: &RemotePath,
    options: Options,
) -> Result<TransferOutcome<RemotePath>> {
    let started = Instant::now();
    let metadata = fs::metadata(src).await.or_raise(|| ErrorKind::InvalidSource(src.to_path_buf()))?;
    if !metadata.is_dir() && !metadata.is_file() {
        exn::bail!(ErrorKind::InvalidSource(src.to_path_buf()));
    }

    let destination = match ctx.remote.resolve(dest).await {
        Ok(node) if node.can_have_children() && (metadata.is_file() || !dest.has_trailing_slash()) => {
            let name = source_name(src).await?;
            dest.join(&name).or_raise(|| ErrorKind::InvalidSource(src.to_path_buf()))?
        },
        Ok(_) => dest.without_trailing_slash(),
        Err(e) if matches!(&*e, RemoteErrorKind::NotFound(_)) => dest.without_trailing_slash(),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Resolve),
    };

    let (jobs, skipped) = match metadata.is_dir() {
        true => {
            let walk = walk(src).await?;
            let jobs = walk
                .files
                .into_iter()
                .map(|file| {
                    let target =
                        destination.join(&file.relative).or_raise(|| ErrorKind::InvalidSource(file.path.clone()))?;
                    Ok(UploadJob::new(file.path, target, file.size))
                })
                .collect::<Result<Vec<_>>>()?;
            (jobs, walk.skipped)
        },
        false => (vec![UploadJob::new(src, destination.clone(), metadata.len())], 0),
    };
    let jobs = dedupe(jobs);
    tracing::debug!(jobs = jobs.len(), destination = %destination, "planned upload");

    let progress = ctx.start_progress(&options, jobs.len());
    let total = jobs.iter().map(|job| job.size).sum();
    progress.set_total(total, Unit::Bytes, "Uploading").or_raise(|| ErrorKind::Progress)?;

    let worker = Worker {
        remote: ctx.remote.clone(),
        transport: ctx.transport.clone(),
        progress: progress.clone(),
        part_size: ctx.config.part_size,
        multipart_threshold: ctx.config.multipart_threshold,
        verbose: options.verbose,
    };
    let files = jobs.len();
    let tasks = jobs.into_iter().map(|job| worker.clone().run(job));
    let result = pool::collect(pool::bounded(tasks, ctx.workers())).await;
    drop(worker);
    let reported = result.and_then(|sent| {
        let summary = TransferSummary {
            files,
            bytes: sent.iter().sum(),
            elapsed: started.elapsed(),
            skipped,
        };
        if options.shows_summary() {
            progress
                .write(format!("Uploaded {summary}"))
                .or_raise(|| ErrorKind::Progress)?;
        }
        Ok(summary)
    });
    let closed = progress.close().await;
    let summary = reported?;
    let progress = closed.or_raise(|| ErrorKind::Progress)?;

    tracing::info!(files, bytes = summary.bytes, skipped, "uploaded {summary}");
    Ok(TransferOutcome {
        destination,
        summary,
        progress,
    })
}

/// Last component of `src`, resolving `.`, `..` and friends first.
async fn source_name(src: &Path) -> Result<String> {
    let canonical = fs::canonicalize(src).await.or_raise(|| ErrorKind::InvalidSource(src.to_path_buf()))?;
    canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidSource(src.to_path_buf())))
}
