//! Remote to local transfers.
//!
//! [`download`] resolves the source, exchanges it for signed URLs, lays out
//! the local tree, settles conflicts with existing files and only then starts
//! moving bytes, so every planning failure happens before the first request
//! to object storage.

mod file;

use self::file::Worker;
use crate::conflict::{create_dir, plan_downloads};
use crate::context::{Options, TransferContext, TransferOutcome};
use crate::error::{ErrorKind, Result};
use crate::job::{DownloadJob, claim_destinations, dedupe};
use crate::pool;
use crate::summary::TransferSummary;
use exn::ResultExt;
use ldata_progress::Unit;
use ldata_remote::{RemotePath, validate_path};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;

/// Download `src` to `dest`.
///
/// A single object lands at `dest`, or inside it as `dest/<name>` if `dest`
/// is a directory. A directory lands at `dest` when `dest` does not exist
/// yet or `src` ends with `/` (contents only); otherwise it is nested as
/// `dest/<name>`.
///
/// The first failing file aborts the rest. Files already completed stay in
/// place; nothing partial is left behind.
///
/// # Examples
///
/// ```no_run
/// use ldata_transfer::{Options, TransferContext, download};
/// use std::path::Path;
///
/// # async fn example(ctx: TransferContext) -> Result<(), Box<dyn std::error::Error>> {
/// let outcome = download(&ctx, &"latch:///runs/42/".parse()?, Path::new("results"), Options::default()).await?;
/// println!("{}: {}", outcome.destination.display(), outcome.summary);
/// # Ok(())
/// # }
/// ```
#[tracing::instrument(skip_all, fields(src = %src, dest = %dest.display()))]
pub async fn download(
    ctx: &TransferContext,
    src: &RemotePath,
    dest: &Path,
    options: Options,
) -> Result<TransferOutcome<PathBuf>> {
    let started = Instant::now();
    check_parent(dest).await?;

    let node = ctx.remote.resolve(src).await.or_raise(|| ErrorKind::Resolve)?;
    let (destination, base, jobs) = if node.can_have_children() {
        let urls = ctx.remote.signed_urls_recursive(src).await.or_raise(|| ErrorKind::Exchange)?;
        let root = match fs::try_exists(dest).await.or_raise(|| ErrorKind::Io(dest.to_path_buf()))? {
            true if !src.has_trailing_slash() => dest.join(&node.name),
            _ => dest.to_path_buf(),
        };
        // Every key is checked before anything is created on disk.
        let entries = urls
            .into_iter()
            .map(|(relative, url)| {
                let relative =
                    validate_path(&relative).or_raise(|| ErrorKind::InvalidDestination(root.join(&relative)))?;
                Ok((relative, url))
            })
            .collect::<Result<Vec<_>>>()?;
        ensure_directory(&root).await?;
        let jobs = entries
            .into_iter()
            .map(|(relative, url)| DownloadJob::new(url, root.join(relative), None))
            .collect();
        (root.clone(), root, jobs)
    } else {
        let url = ctx.remote.signed_url_for(src).await.or_raise(|| ErrorKind::Exchange)?;
        let target = match fs::metadata(dest).await {
            Ok(metadata) if metadata.is_dir() => dest.join(&node.name),
            _ => dest.to_path_buf(),
        };
        let base = target.parent().map(Path::to_path_buf).unwrap_or_default();
        (target.clone(), base, vec![DownloadJob::new(url, target, node.size)])
    };
    let (jobs, unclaimed) = claim_destinations(dedupe(jobs));
    tracing::debug!(jobs = jobs.len(), destination = %destination.display(), "planned download");

    let confirm = options.confirm_overwrite.then_some(ctx.confirm.as_ref());
    let plan = plan_downloads(jobs, &base, confirm).await?;

    let progress = ctx.start_progress(&options, plan.jobs.len());
    for rejected in plan.conflicts.iter() {
        progress
            .write(format!("Skipping {}: a file is in the way", rejected.display()))
            .or_raise(|| ErrorKind::Progress)?;
    }
    let (total, unit) = match plan.jobs.iter().map(|job| job.size).sum::<Option<u64>>() {
        Some(bytes) => (bytes, Unit::Bytes),
        None => (plan.jobs.len() as u64, Unit::Files),
    };
    progress.set_total(total, unit, "Downloading").or_raise(|| ErrorKind::Progress)?;

    let worker = Worker {
        transport: ctx.transport.clone(),
        progress: progress.clone(),
        unit,
        chunk_size: usize::try_from(ctx.config.chunk_size).unwrap_or(usize::MAX),
        verbose: options.verbose,
    };
    let files = plan.jobs.len();
    let tasks = plan.jobs.into_iter().map(|job| worker.clone().run(job));
    let result = pool::collect(pool::bounded(tasks, ctx.workers())).await;
    drop(worker);
    let reported = result.and_then(|written| {
        let summary = TransferSummary {
            files,
            bytes: written.iter().sum(),
            elapsed: started.elapsed(),
            skipped: plan.skipped + unclaimed,
        };
        if options.shows_summary() {
            progress
                .write(format!("Downloaded {summary}"))
                .or_raise(|| ErrorKind::Progress)?;
        }
        Ok(summary)
    });
    let closed = progress.close().await;
    let summary = reported?;
    let progress = closed.or_raise(|| ErrorKind::Progress)?;

    tracing::info!(files, bytes = summary.bytes, skipped = summary.skipped, "downloaded {summary}");
    Ok(TransferOutcome {
        destination,
        summary,
        progress,
    })
}

/// The destination's parent has to exist already; only the destination
/// itself (and the tree below it) is ever created.
async fn check_parent(dest: &Path) -> Result<()> {
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        // Relative single component: the current directory.
        Some(_) => Path::new("."),
        None => return Ok(()),
    };
    match fs::metadata(parent).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        _ => exn::bail!(ErrorKind::InvalidDestination(dest.to_path_buf())),
    }
}

async fn ensure_directory(dir: &Path) -> Result<()> {
    match fs::metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => exn::bail!(ErrorKind::InvalidDestination(dir.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => create_dir(dir).await,
        Err(e) => Err(e).or_raise(|| ErrorKind::InvalidDestination(dir.to_path_buf())),
    }
}
