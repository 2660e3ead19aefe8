//! Concurrent transfers between local disk and Latch remote storage.
//!
//! Two entry points, [`download`] and [`upload`], share the same shape:
//!
//! 1. resolve the remote side and exchange it for signed URLs,
//! 2. plan one job per file (settling local conflicts for downloads),
//! 3. run the jobs on a bounded pool of tasks, reporting through a shared
//!    [`ProgressHandle`](ldata_progress::ProgressHandle),
//! 4. return a [`TransferSummary`].
//!
//! The first failing file aborts the whole transfer; there are no retries.
//! The control plane and object storage are reached only through the
//! [`Remote`](ldata_remote::Remote) and [`ObjectTransport`] traits, so the
//! engines run unchanged against the in-memory mocks in tests.

pub mod confirm;
mod conflict;
mod context;
mod download;
pub mod error;
mod job;
mod pool;
mod summary;
pub mod transport;
mod upload;

pub use crate::confirm::{Always, Confirm, TerminalConfirm};
pub use crate::conflict::ConflictSet;
pub use crate::context::{MAX_PARTS, MIB, MIN_PART_SIZE, Options, TransferConfig, TransferContext, TransferOutcome};
pub use crate::download::download;
pub use crate::job::{DownloadJob, UploadJob, dedupe};
pub use crate::summary::{TransferSummary, format_bytes, format_duration};
#[cfg(feature = "http")]
pub use crate::transport::HttpTransport;
pub use crate::transport::{ByteStream, Download, ObjectTransport, TransportHandle};
pub use crate::upload::upload;
pub use ldata_progress::ProgressMode;
