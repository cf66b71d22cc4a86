use super::{ContentVariant, StaticFile};
use crate::router::{Resolved, Resolver};
use http::Method;
use std::path::{Component, Path, PathBuf};

/// A directory tree mounted under a route prefix.
///
/// The part of the request path after the prefix is mapped onto `root`. Lookups that would leave
/// the root, or that name something other than a regular file, decline so the route table keeps
/// scanning.
#[derive(Debug, Clone)]
pub struct Directory {
    root: PathBuf,
}

impl Directory {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a `/`-led sub-path onto the root without touching the filesystem.
    ///
    /// Returns `None` for anything that is not a plain relative path: parent segments (in any
    /// percent-encoding), absolute components, backslashes and NUL bytes.
    fn map_path(&self, sub_path: &str) -> Option<PathBuf> {
        let relative = sub_path.strip_prefix('/')?;
        if relative.is_empty() {
            return None;
        }
        for segment in relative.split('/') {
            if segment.contains('\\') || segment.contains('\0') {
                return None;
            }
            let decoded = urlencoding::decode(segment).ok()?;
            if decoded == ".." {
                return None;
            }
        }

        let mut pb = self.root.clone();
        for comp in Path::new(relative).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    /// Find the file for `sub_path`, if there is one.
    #[must_use]
    pub fn lookup(&self, sub_path: &str) -> Option<StaticFile> {
        let path = self.map_path(sub_path)?;
        path.is_file().then(|| StaticFile::new(path))
    }
}

impl Resolver for Directory {
    fn resolve(&self, remainder: &str, captures: &[String], _method: &Method) -> Option<Resolved> {
        self.lookup(remainder).map(|file| Resolved {
            content: ContentVariant::StaticFile(file),
            captures: captures.to_vec(),
        })
    }
}
