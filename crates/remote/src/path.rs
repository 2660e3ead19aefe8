//! Path validation and `latch://` path parsing.
//!
//! Relative paths handed out by the control plane (e.g. the keys of a
//! recursive signed-URL mapping) end up joined onto local directories, so they
//! are validated here to make sure they never escape their root.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

pub const SCHEME: &str = "latch://";

/// Validates a relative path for security and correctness.
/// Ensures that paths don't escape their root (no `..` traversal).
///
/// > **Note:** This does **not** normalize backslashes, non-UTF8 bytes, or
/// >           platform-specific weirdness. Null bytes are explicitly rejected.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use ldata_remote::validate_path;
/// // Valid paths
/// assert!(validate_path("reads/sample_1.fastq.gz").is_ok());
/// assert!(validate_path("a/../file.bam").is_ok()); // (never leaves root)
/// // Invalid paths
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a/../../b").is_err());
/// assert!(validate_path("a\0b").is_err());
/// // Paths get resolved
/// assert_eq!(
///     validate_path("wrong/../still-wrong/.././correct//./path.bam/").unwrap(),
///     Path::new("correct/path.bam")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let normalized = normalize(path.as_ref())?;
    match normalized.as_os_str().is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().display().to_string())),
        false => Ok(normalized),
    }
}

/// Same rules as [`validate`], except an empty result (the root itself) is
/// allowed.
fn normalize(path: &Path) -> Result<PathBuf> {
    let invalid = || ErrorKind::InvalidPath(path.display().to_string());
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls, reject them explicitly.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(invalid());
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(invalid()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(invalid());
                }
            },
        }
    }
    Ok(components.into_iter().collect())
}

/// A parsed `latch://<domain>/<path>` location.
///
/// An empty domain (`latch:///...`) refers to the caller's default account.
/// Whether the original string ended with a `/` is remembered, because
/// transfers use it to decide between copying a directory itself or only its
/// contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath {
    domain: String,
    path: PathBuf,
    trailing_slash: bool,
}

impl RemotePath {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Path below the domain root. Empty for the root itself.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    /// Last path component, or the domain for the root.
    pub fn name(&self) -> &str {
        self.path.file_name().and_then(|n| n.to_str()).unwrap_or(&self.domain)
    }

    /// Append a relative path. The result never carries a trailing slash.
    pub fn join(&self, relative: impl AsRef<Path>) -> Result<Self> {
        let relative = validate(relative)?;
        Ok(Self {
            domain: self.domain.clone(),
            path: self.path.join(relative),
            trailing_slash: false,
        })
    }

    /// Same location, but without the trailing slash marker.
    pub fn without_trailing_slash(&self) -> Self {
        Self { trailing_slash: false, ..self.clone() }
    }
}

impl FromStr for RemotePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s.strip_prefix(SCHEME).ok_or_else(|| Error::from(ErrorKind::InvalidPath(s.to_string())))?;
        let (domain, path) = rest.split_once('/').unwrap_or((rest, ""));
        if domain.contains(['\0', '\\']) {
            exn::bail!(ErrorKind::InvalidPath(s.to_string()));
        }
        let normalized = normalize(Path::new(path))?;
        // `latch://acct` names the root as much as `latch://acct/`, but only
        // the latter asks for its contents.
        let trailing_slash = rest.contains('/') && rest.ends_with('/');
        Ok(Self {
            domain: domain.to_string(),
            path: normalized,
            trailing_slash,
        })
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.domain, self.path.display())?;
        if self.trailing_slash && !self.path.as_os_str().is_empty() {
            f.write_str("/")?;
        }
        Ok(())
    }
}
