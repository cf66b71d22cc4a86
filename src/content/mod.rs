//! # Content Module
//!
//! [`ContentVariant`] is the closed set of things a route can resolve to. Dispatch matches on it
//! exhaustively, one arm per variant, so adding a variant is a compile error until every
//! dispatcher handles it.
//!
//! | Variant | Produces |
//! |---|---|
//! | [`ContentVariant::StaticBytes`] | fixed bytes |
//! | [`ContentVariant::StaticFile`] | a file read per request |
//! | [`ContentVariant::Directory`] | nested lookup to a [`StaticFile`] |
//! | [`ContentVariant::Transform`] | bytes from an external transform, recomputed per request |
//! | [`ContentVariant::Computed`] | bytes from a callable, recomputed per request |
//! | [`ContentVariant::Endpoint`] | JSON from a GET/POST/PUT callback |
//! | [`ContentVariant::Object`] | a stateful object (snapshot + action protocol) |
//! | [`ContentVariant::Events`] | the live event stream of a stateful object |
//! | [`ContentVariant::Mount`] | any custom nested [`Resolver`](crate::router::Resolver) |
//!
//! Every variant is cheap to clone; heavy state sits behind `Arc`.

mod directory;
mod endpoint;
mod transform;

pub use directory::Directory;
pub use endpoint::{Call, Endpoint, EndpointHandler, GetFn, PostFn, PutFn};
pub use transform::{CommandTransform, ExternalTransform, Transform};

use crate::object::StatefulObject;
use crate::router::Resolver;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Callable producing a response body.
pub type Producer = dyn Fn() -> anyhow::Result<Vec<u8>> + Send + Sync;

/// Suffix under a stateful object's mount point that serves its event stream.
pub const EVENTS_SUFFIX: &str = "+events";

/// Infer a content type from a file extension.
///
/// Only the extensions the engine knows are mapped; anything else yields `None` and the response
/// carries no `Content-Type` header.
#[must_use]
pub fn guess_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "js" => Some("application/javascript"),
        "css" => Some("text/css"),
        "png" => Some("image/png"),
        "html" => Some("text/html"),
        "woff" => Some("application/x-font-woff"),
        _ => None,
    }
}

/// A file on disk, read fresh on every GET.
#[derive(Debug, Clone)]
pub struct StaticFile {
    path: PathBuf,
    content_type: Option<String>,
}

impl StaticFile {
    /// File whose content type is guessed from its extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content_type = guess_content_type(&path).map(str::to_string);
        Self { path, content_type }
    }

    /// Override the guessed content type; `None` suppresses the header.
    #[must_use]
    pub fn with_content_type(mut self, content_type: Option<&str>) -> Self {
        self.content_type = content_type.map(str::to_string);
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

/// What a route resolves to.
#[derive(Clone)]
pub enum ContentVariant {
    StaticBytes {
        data: Arc<[u8]>,
        content_type: Option<String>,
    },
    StaticFile(StaticFile),
    Directory(Directory),
    Transform(ExternalTransform),
    Computed {
        producer: Arc<Producer>,
        content_type: Option<String>,
    },
    Endpoint(Endpoint),
    Object(Arc<StatefulObject>),
    Events(Arc<StatefulObject>),
    Mount(Arc<dyn Resolver>),
}

impl ContentVariant {
    /// Fixed bytes served without a content type.
    pub fn bytes(data: impl AsRef<[u8]>) -> Self {
        ContentVariant::StaticBytes {
            data: Arc::from(data.as_ref()),
            content_type: None,
        }
    }

    /// Fixed bytes served with an explicit content type.
    pub fn typed_bytes(data: impl AsRef<[u8]>, content_type: &str) -> Self {
        ContentVariant::StaticBytes {
            data: Arc::from(data.as_ref()),
            content_type: Some(content_type.to_string()),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        ContentVariant::StaticFile(StaticFile::new(path))
    }

    pub fn directory(root: impl Into<PathBuf>) -> Self {
        ContentVariant::Directory(Directory::new(root))
    }

    /// Bytes computed by `producer` on every GET.
    pub fn computed<F>(content_type: Option<&str>, producer: F) -> Self
    where
        F: Fn() -> anyhow::Result<Vec<u8>> + Send + Sync + 'static,
    {
        ContentVariant::Computed {
            producer: Arc::new(producer),
            content_type: content_type.map(str::to_string),
        }
    }

    /// Custom nested resolver mounted under a route.
    pub fn mount<R: Resolver + 'static>(resolver: R) -> Self {
        ContentVariant::Mount(Arc::new(resolver))
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ContentVariant::StaticBytes { .. } => "static_bytes",
            ContentVariant::StaticFile(_) => "static_file",
            ContentVariant::Directory(_) => "directory",
            ContentVariant::Transform(_) => "transform",
            ContentVariant::Computed { .. } => "computed",
            ContentVariant::Endpoint(_) => "endpoint",
            ContentVariant::Object(_) => "object",
            ContentVariant::Events(_) => "events",
            ContentVariant::Mount(_) => "mount",
        }
    }

    /// Whether this variant resolves the part of the path left after its route's prefix.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            ContentVariant::Directory(_) | ContentVariant::Object(_) | ContentVariant::Mount(_)
        )
    }
}

impl fmt::Debug for ContentVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentVariant::StaticFile(file) => write!(f, "StaticFile({})", file.path.display()),
            ContentVariant::Directory(dir) => write!(f, "Directory({})", dir.root().display()),
            ContentVariant::Object(obj) | ContentVariant::Events(obj) => {
                write!(f, "{}({})", self.kind(), obj.name())
            }
            other => f.write_str(other.kind()),
        }
    }
}

impl From<StaticFile> for ContentVariant {
    fn from(file: StaticFile) -> Self {
        ContentVariant::StaticFile(file)
    }
}

impl From<Directory> for ContentVariant {
    fn from(dir: Directory) -> Self {
        ContentVariant::Directory(dir)
    }
}

impl From<ExternalTransform> for ContentVariant {
    fn from(transform: ExternalTransform) -> Self {
        ContentVariant::Transform(transform)
    }
}

impl From<Endpoint> for ContentVariant {
    fn from(endpoint: Endpoint) -> Self {
        ContentVariant::Endpoint(endpoint)
    }
}

impl From<Arc<StatefulObject>> for ContentVariant {
    fn from(object: Arc<StatefulObject>) -> Self {
        ContentVariant::Object(object)
    }
}
