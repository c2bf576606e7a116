//! Project-context resolution.
//!
//! Decides, per logger construction, whether events go to the user's global
//! registry (`$HOME/.claude`) or a project-scoped one (`{project}/.claude`).
//! The nearest ancestor of `cwd` holding a marker directory wins, except
//! `$HOME` itself: its marker is the global root, and treating it as a project
//! would alias the two.

use std::path::{Path, PathBuf};

use tracing::debug;

use hub_core::constants::MARKER_DIR;

use crate::errors::{RegistryError, Result};

/// The directory under which the `logs/` partitioned tree lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryRoot {
    /// The per-user root, `{home}/{marker}`.
    Global {
        /// Marker directory path.
        path: PathBuf,
    },
    /// A project-scoped root, `{project}/{marker}`.
    Project {
        /// Project directory containing the marker.
        project: PathBuf,
        /// Marker directory path.
        path: PathBuf,
    },
}

impl RegistryRoot {
    /// The global root for `home` with the default marker.
    #[must_use]
    pub fn global(home: &Path) -> Self {
        Self::Global {
            path: home.join(MARKER_DIR),
        }
    }

    /// The root directory itself (the marker directory).
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Global { path } | Self::Project { path, .. } => path,
        }
    }

    /// `{root}/{name}`, the directory holding the date partitions.
    #[must_use]
    pub fn logs_dir(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// Whether this is a project-scoped root.
    #[must_use]
    pub fn is_project(&self) -> bool {
        matches!(self, Self::Project { .. })
    }
}

/// How a logger picks its registry root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    /// Project root if one encloses `cwd`, else the global root.
    #[default]
    Auto,
    /// Always the global root.
    Global,
    /// A project root; failing to find one is an error.
    Project,
}

/// Walks from a working directory toward the filesystem root.
#[derive(Clone, Debug)]
pub struct ContextResolver {
    marker: String,
}

impl Default for ContextResolver {
    fn default() -> Self {
        Self::new(MARKER_DIR)
    }
}

impl ContextResolver {
    /// Resolver looking for `marker` directories.
    #[must_use]
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Nearest ancestor of `cwd` (inclusive) that holds a marker directory and
    /// is not `home`.
    ///
    /// A marker that exists but is not a directory does not count.
    #[must_use]
    pub fn find_project_root(&self, cwd: &Path, home: &Path) -> Option<PathBuf> {
        let canonical_home = home.canonicalize().ok();
        for dir in cwd.ancestors() {
            if is_same_dir(dir, home, canonical_home.as_deref()) {
                continue;
            }
            if dir.join(&self.marker).is_dir() {
                debug!(project = %dir.display(), "found project registry marker");
                return Some(dir.to_path_buf());
            }
        }
        None
    }

    /// Project root if one encloses `cwd`, otherwise the global root.
    #[must_use]
    pub fn resolve_root(&self, cwd: &Path, home: &Path) -> RegistryRoot {
        match self.find_project_root(cwd, home) {
            Some(project) => RegistryRoot::Project {
                path: project.join(&self.marker),
                project,
            },
            None => {
                debug!(cwd = %cwd.display(), "no project context, using global registry");
                self.global_root(home)
            }
        }
    }

    /// Root for `scope`.
    pub fn resolve_scoped(&self, scope: Scope, cwd: &Path, home: &Path) -> Result<RegistryRoot> {
        match scope {
            Scope::Auto => Ok(self.resolve_root(cwd, home)),
            Scope::Global => Ok(self.global_root(home)),
            Scope::Project => {
                let root = self.resolve_root(cwd, home);
                if root.is_project() {
                    Ok(root)
                } else {
                    Err(RegistryError::NoProjectContext {
                        cwd: cwd.to_path_buf(),
                    })
                }
            }
        }
    }

    /// The global root for `home`.
    #[must_use]
    pub fn global_root(&self, home: &Path) -> RegistryRoot {
        RegistryRoot::Global {
            path: home.join(&self.marker),
        }
    }
}

/// Convenience wrapper over [`ContextResolver::resolve_root`] with the default
/// marker.
#[must_use]
pub fn resolve_root(cwd: &Path, home: &Path) -> RegistryRoot {
    ContextResolver::default().resolve_root(cwd, home)
}

fn is_same_dir(dir: &Path, home: &Path, canonical_home: Option<&Path>) -> bool {
    if dir == home {
        return true;
    }
    match (canonical_home, dir.canonicalize()) {
        (Some(home), Ok(dir)) => dir == home,
        _ => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn layout() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        let work = dir.path().join("work");
        std::fs::create_dir_all(home.join(".claude")).unwrap();
        std::fs::create_dir_all(&work).unwrap();
        (dir, home, work)
    }

    #[test]
    fn no_marker_falls_back_to_global() {
        let (_tmp, home, work) = layout();
        let root = resolve_root(&work, &home);
        assert_eq!(root, RegistryRoot::global(&home));
        assert!(!root.is_project());
    }

    #[test]
    fn nested_project_resolves_to_marker() {
        let (_tmp, home, work) = layout();
        let project = work.join("proj");
        std::fs::create_dir_all(project.join(".claude")).unwrap();
        let deep = project.join("a").join("b").join("c");
        std::fs::create_dir_all(&deep).unwrap();

        let root = resolve_root(&deep, &home);
        assert_eq!(
            root,
            RegistryRoot::Project {
                project: project.clone(),
                path: project.join(".claude"),
            }
        );
        assert_eq!(root.logs_dir("logs"), project.join(".claude").join("logs"));
        assert_eq!(root.logs_dir("events"), project.join(".claude").join("events"));
    }

    #[test]
    fn nearest_marker_wins() {
        let (_tmp, home, work) = layout();
        std::fs::create_dir_all(work.join(".claude")).unwrap();
        let inner = work.join("inner");
        std::fs::create_dir_all(inner.join(".claude")).unwrap();
        let root = resolve_root(&inner.join("."), &home);
        assert_matches!(root, RegistryRoot::Project { project, .. } if project.ends_with("inner"));
    }

    #[test]
    fn home_is_never_a_project() {
        let (_tmp, home, _work) = layout();
        let below_home = home.join("code").join("thing");
        std::fs::create_dir_all(&below_home).unwrap();
        assert_eq!(resolve_root(&below_home, &home), RegistryRoot::global(&home));
        assert_eq!(resolve_root(&home, &home), RegistryRoot::global(&home));
    }

    #[test]
    fn project_under_home_still_found() {
        let (_tmp, home, _work) = layout();
        let project = home.join("code").join("proj");
        std::fs::create_dir_all(project.join(".claude")).unwrap();
        assert!(resolve_root(&project, &home).is_project());
    }

    #[test]
    fn file_marker_is_ignored() {
        let (_tmp, home, work) = layout();
        let project = work.join("proj");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join(".claude"), "not a dir").unwrap();
        assert_eq!(resolve_root(&project, &home), RegistryRoot::global(&home));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_home_is_recognized() {
        let (tmp, home, _work) = layout();
        let link = tmp.path().join("home-link");
        std::os::unix::fs::symlink(&home, &link).unwrap();
        let root = resolve_root(&link, &home);
        assert!(!root.is_project());
    }

    #[test]
    fn project_scope_requires_context() {
        let (_tmp, home, work) = layout();
        let resolver = ContextResolver::default();
        let err = resolver
            .resolve_scoped(Scope::Project, &work, &home)
            .unwrap_err();
        assert_matches!(err, RegistryError::NoProjectContext { cwd } if cwd == work);
    }

    #[test]
    fn global_scope_ignores_project() {
        let (_tmp, home, work) = layout();
        std::fs::create_dir_all(work.join(".claude")).unwrap();
        let resolver = ContextResolver::default();
        let root = resolver.resolve_scoped(Scope::Global, &work, &home).unwrap();
        assert_eq!(root, RegistryRoot::global(&home));
    }

    #[test]
    fn custom_marker() {
        let (_tmp, home, work) = layout();
        std::fs::create_dir_all(work.join(".hub")).unwrap();
        let resolver = ContextResolver::new(".hub");
        let root = resolver.resolve_root(&work, &home);
        assert_eq!(root.path(), work.join(".hub"));
    }
}
