//! Safe-path validation for user-supplied filesystem paths.
//!
//! Configuration may reference `.proto` sources, certificates, and keys by
//! path. Before any such file is read, the path must pass a [`PathPolicy`]
//! check: no parent-directory segments, and the resolved location must fall
//! inside the process working directory or one of an explicit list of
//! allowed directories.
//!
//! The policy is a plain value: construct it once at process start and
//! thread it into the loaders. Tests construct their own via
//! [`PathPolicy::allowing`].

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Allowed filesystem roots for user-supplied paths.
///
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct PathPolicy {
    workdir: PathBuf,
    allowed: Vec<PathBuf>,
}

impl PathPolicy {
    /// Policy rooted at the process working directory with no extra roots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the working directory cannot be resolved.
    pub fn current_dir() -> Result<Self> {
        Ok(Self {
            workdir: std::env::current_dir()?.canonicalize()?,
            allowed: Vec::new(),
        })
    }

    /// Policy rooted at the process working directory plus explicit roots.
    ///
    /// Roots that do not exist are kept verbatim; existing roots are
    /// canonicalized so symlinked temp directories compare correctly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the working directory cannot be resolved.
    pub fn allowing<I, P>(roots: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut policy = Self::current_dir()?;
        for root in roots {
            let root = root.as_ref();
            policy
                .allowed
                .push(root.canonicalize().unwrap_or_else(|_| root.to_path_buf()));
        }
        Ok(policy)
    }

    /// Validate a user-supplied path and return its resolved absolute form.
    ///
    /// Non-existent trailing segments are permitted provided the first
    /// existing ancestor resolves inside an allowed root; symbolic links in
    /// that ancestor are evaluated before the containment check.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPath`] if the path contains a `..` segment;
    /// - [`Error::PathEscape`] if the resolved path is outside the working
    ///   directory and every allowed root;
    /// - [`Error::Io`] if resolution itself fails.
    pub fn check(&self, path: &Path) -> Result<PathBuf> {
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(Error::InvalidPath {
                path: path.display().to_string(),
            });
        }

        let resolved = self.resolve(path)?;
        if resolved.starts_with(&self.workdir)
            || self.allowed.iter().any(|root| resolved.starts_with(root))
        {
            Ok(resolved)
        } else {
            Err(Error::PathEscape {
                path: path.display().to_string(),
            })
        }
    }

    /// Resolve to an absolute path, evaluating symlinks against the first
    /// existing ancestor and re-appending the non-existent tail.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workdir.join(path)
        };

        let mut existing = absolute.clone();
        let mut tail: Vec<std::ffi::OsString> = Vec::new();
        while !existing.exists() {
            match existing.file_name() {
                Some(name) => {
                    tail.push(name.to_os_string());
                    existing.pop();
                }
                // Ran out of components without finding an existing ancestor.
                None => return Ok(absolute),
            }
        }

        let mut resolved = existing.canonicalize()?;
        for segment in tail.into_iter().rev() {
            resolved.push(segment);
        }
        Ok(resolved)
    }
}
