use anyhow::Context;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Turns a source file into response bytes.
///
/// Transforms run on every request; nothing is cached.
pub trait Transform: Send + Sync {
    fn apply(&self, source: &Path) -> anyhow::Result<Vec<u8>>;
}

impl<F> Transform for F
where
    F: Fn(&Path) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    fn apply(&self, source: &Path) -> anyhow::Result<Vec<u8>> {
        self(source)
    }
}

/// Runs an external program with the source path appended to its arguments and serves stdout.
///
/// A non-zero exit is an error carrying the program's stderr.
#[derive(Debug, Clone)]
pub struct CommandTransform {
    program: String,
    args: Vec<String>,
}

impl CommandTransform {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl Transform for CommandTransform {
    fn apply(&self, source: &Path) -> anyhow::Result<Vec<u8>> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .output()
            .with_context(|| format!("failed to run {}", self.program))?;
        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.stdout)
    }
}

/// A source file served through a [`Transform`].
#[derive(Clone)]
pub struct ExternalTransform {
    source: PathBuf,
    id: String,
    transform: Arc<dyn Transform>,
    content_type: Option<String>,
}

impl ExternalTransform {
    /// `id` names the transform in logs and errors.
    pub fn new<T: Transform + 'static>(
        source: impl Into<PathBuf>,
        id: impl Into<String>,
        transform: T,
    ) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
            transform: Arc::new(transform),
            content_type: None,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn run(&self) -> anyhow::Result<Vec<u8>> {
        self.transform.apply(&self.source)
    }
}

impl fmt::Debug for ExternalTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalTransform")
            .field("source", &self.source)
            .field("id", &self.id)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_transform_sees_source_path() {
        let t = ExternalTransform::new("/srv/app.jsx", "upper", |p: &Path| -> anyhow::Result<Vec<u8>> {
            Ok(p.display().to_string().to_uppercase().into_bytes())
        })
        .with_content_type("application/javascript");
        assert_eq!(t.run().unwrap(), b"/SRV/APP.JSX");
        assert_eq!(t.content_type(), Some("application/javascript"));
        assert_eq!(t.id(), "upper");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_transform_stdout_and_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("style.less");
        std::fs::write(&src, "a { color: red }").unwrap();

        let cat = CommandTransform::new("cat");
        assert_eq!(cat.apply(&src).unwrap(), b"a { color: red }");

        let missing = tmp.path().join("missing.less");
        let err = cat.apply(&missing).unwrap_err();
        assert!(err.to_string().contains("cat exited with"));
    }

    #[test]
    fn test_missing_program_keeps_io_error_source() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("app.ts");
        std::fs::write(&src, "let x = 1;").unwrap();

        let err = CommandTransform::new("webobj-no-such-compiler")
            .apply(&src)
            .unwrap_err();
        assert_eq!(err.to_string(), "failed to run webobj-no-such-compiler");
        let io = err.root_cause().downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::NotFound);
    }
}
