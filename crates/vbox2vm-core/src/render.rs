//! Template rendering.
//!
//! Templates are Jinja2-style text files rendered with Tera. A
//! [`TemplateRenderer`] is bound to one template directory; templates are
//! selected by file name at render time.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tera::Tera;
use tracing::debug;

use crate::context::RenderContext;
use crate::error::{Error, Result};

/// Template directory shipped with this crate.
///
/// This is the source-tree path at build time. A binary moved elsewhere still
/// renders [`DEFAULT_TEMPLATE_NAME`] from its embedded copy.
pub const DEFAULT_TEMPLATE_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/templates");

/// vSphere template for CentOS 7 guests.
pub const DEFAULT_TEMPLATE_NAME: &str = "centos7.ovf.j2";

/// Compiled-in copy of [`DEFAULT_TEMPLATE_NAME`], used when the template
/// directory does not provide one.
const BUNDLED_TEMPLATE: &str = include_str!("../templates/centos7.ovf.j2");

/// Renders named templates from a fixed directory.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template_dir: PathBuf,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE_DIR)
    }
}

impl TemplateRenderer {
    /// Create a renderer reading templates from `template_dir`.
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Resolve a template name to its path.
    ///
    /// Names must be a single file name inside the template directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateNotFound`] if the name contains path
    /// separators or does not name an existing file.
    pub fn template_path(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        let is_plain_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );

        let path = self.template_dir.join(name);
        if !is_plain_name || !path.is_file() {
            return Err(Error::TemplateNotFound {
                name: name.to_string(),
                dir: self.template_dir.clone(),
            });
        }
        Ok(path)
    }

    /// Names of all templates that can be rendered, sorted.
    ///
    /// This is every file in the directory plus [`DEFAULT_TEMPLATE_NAME`],
    /// which is always available. A missing directory lists only the latter.
    pub fn available_templates(&self) -> Result<Vec<String>> {
        let mut names = vec![DEFAULT_TEMPLATE_NAME.to_string()];

        let entries = match fs::read_dir(&self.template_dir) {
            Ok(entries) => Some(entries),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(Error::io(e, &self.template_dir)),
        };
        for entry in entries.into_iter().flatten() {
            let entry = entry.map_err(|e| Error::io(e, &self.template_dir))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Render the named template with `context`.
    ///
    /// # Errors
    ///
    /// - [`Error::TemplateNotFound`] if the template does not exist.
    /// - [`Error::MissingKey`] if the template uses a key `context` lacks.
    /// - [`Error::Template`] for syntax errors and other render failures.
    pub fn render(&self, name: &str, context: &RenderContext) -> Result<String> {
        let source = self.load(name)?;
        render_source(name, &source, context)
    }

    /// Read a template's source, falling back to the embedded default template.
    fn load(&self, name: &str) -> Result<String> {
        match self.template_path(name) {
            Ok(path) => {
                let source = fs::read_to_string(&path).map_err(|e| Error::io(e, &path))?;
                debug!(template = name, path = %path.display(), "loaded template");
                Ok(source)
            }
            Err(Error::TemplateNotFound { .. }) if name == DEFAULT_TEMPLATE_NAME => {
                debug!(
                    template = name,
                    dir = %self.template_dir.display(),
                    "template not in directory, using embedded copy"
                );
                Ok(BUNDLED_TEMPLATE.to_string())
            }
            Err(e) => Err(e),
        }
    }
}

/// Render template text that is already in memory.
pub fn render_source(name: &str, source: &str, context: &RenderContext) -> Result<String> {
    let mut tera = Tera::default();
    // Descriptors are emitted as-is; values are never HTML-escaped.
    tera.autoescape_on(vec![]);
    tera.add_raw_template(name, source)
        .map_err(|e| Error::template(format_tera_error(&e)))?;

    let tera_context = context
        .to_tera()
        .map_err(|e| Error::template(format_tera_error(&e)))?;

    tera.render(name, &tera_context)
        .map_err(|e| classify_render_error(name, &e))
}

fn classify_render_error(name: &str, error: &tera::Error) -> Error {
    let mut current: Option<&dyn std::error::Error> = Some(error);
    while let Some(err) = current {
        if let Some(key) = extract_variable_name(&err.to_string()) {
            return Error::MissingKey {
                template: name.to_string(),
                key,
            };
        }
        current = err.source();
    }
    Error::template(format_tera_error(error))
}

/// Extract the variable name from Tera's "Variable `foo` not found" message.
fn extract_variable_name(message: &str) -> Option<String> {
    static VARIABLE_NOT_FOUND: OnceLock<Option<Regex>> = OnceLock::new();
    let re = VARIABLE_NOT_FOUND
        .get_or_init(|| Regex::new(r"Variable `([^`]+)` not found").ok())
        .as_ref()?;
    re.captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Join a Tera error and its sources into one line.
fn format_tera_error(error: &tera::Error) -> String {
    let mut parts = vec![error.to_string()];
    let mut current = std::error::Error::source(error);
    while let Some(err) = current {
        parts.push(err.to_string());
        current = err.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context() -> RenderContext {
        RenderContext::new()
            .with("ovf_network_name", "NAT")
            .with("memory", 2048i64)
    }

    #[test]
    fn test_render_source_substitutes_values() {
        let out = render_source(
            "inline",
            "<Network ovf:name=\"{{ ovf_network_name }}\"/> {{ memory }}",
            &context(),
        )
        .unwrap();
        assert_eq!(out, "<Network ovf:name=\"NAT\"/> 2048");
    }

    #[test]
    fn test_render_source_does_not_escape() {
        let ctx = RenderContext::new().with("format", "vmdk.html#streamOptimized&x=<1>");
        let out = render_source("inline.xml", "{{ format }}", &ctx).unwrap();
        assert_eq!(out, "vmdk.html#streamOptimized&x=<1>");
    }

    #[test]
    fn test_render_source_missing_key() {
        let err = render_source("inline", "{{ cpus }}", &context()).unwrap_err();
        match err {
            Error::MissingKey { template, key } => {
                assert_eq!(template, "inline");
                assert_eq!(key, "cpus");
            }
            other => panic!("expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn test_render_source_syntax_error() {
        let err = render_source("inline", "{{ memory ", &context()).unwrap_err();
        assert!(matches!(err, Error::Template { .. }));
    }

    #[test]
    fn test_render_supports_conditionals() {
        let out = render_source(
            "inline",
            "{% if memory > 1024 %}big{% else %}small{% endif %}",
            &context(),
        )
        .unwrap();
        assert_eq!(out, "big");
    }

    #[test]
    fn test_render_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("net.j2"), "net={{ ovf_network_name }}").unwrap();

        let renderer = TemplateRenderer::new(dir.path());
        assert_eq!(renderer.render("net.j2", &context()).unwrap(), "net=NAT");
    }

    #[test]
    fn test_template_not_found() {
        let dir = TempDir::new().unwrap();
        let renderer = TemplateRenderer::new(dir.path());
        let err = renderer.render("missing.j2", &context()).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound { ref name, .. } if name == "missing.j2"));
    }

    #[test]
    fn test_template_name_cannot_escape_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("templates");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("secret.j2"), "x").unwrap();

        let renderer = TemplateRenderer::new(&nested);
        for name in ["../secret.j2", "", "sub/secret.j2"] {
            let err = renderer.template_path(name).unwrap_err();
            assert!(matches!(err, Error::TemplateNotFound { .. }), "{name}");
        }
    }

    #[test]
    fn test_available_templates_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.j2"), "").unwrap();
        fs::write(dir.path().join("a.j2"), "").unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();

        let renderer = TemplateRenderer::new(dir.path());
        assert_eq!(
            renderer.available_templates().unwrap(),
            vec!["a.j2", "b.j2", DEFAULT_TEMPLATE_NAME]
        );
    }

    #[test]
    fn test_default_template_renders_without_template_files() {
        let dir = TempDir::new().unwrap();
        let renderer = TemplateRenderer::new(dir.path().join("uninstalled"));
        let ctx = crate::context::CONTEXT_KEYS
            .iter()
            .fold(RenderContext::new(), |ctx, key| ctx.with(*key, "x"));

        let out = renderer.render(DEFAULT_TEMPLATE_NAME, &ctx).unwrap();
        assert_eq!(out, render_source(DEFAULT_TEMPLATE_NAME, BUNDLED_TEMPLATE, &ctx).unwrap());
        assert!(out.starts_with("<?xml"));
        assert_eq!(renderer.available_templates().unwrap(), vec![DEFAULT_TEMPLATE_NAME]);

        // Other names still need a file
        let err = renderer.render("ubuntu.ovf.j2", &ctx).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound { .. }));
    }

    #[test]
    fn test_directory_template_shadows_embedded_default() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DEFAULT_TEMPLATE_NAME), "custom {{ memory }}").unwrap();

        let renderer = TemplateRenderer::new(dir.path());
        assert_eq!(renderer.render(DEFAULT_TEMPLATE_NAME, &context()).unwrap(), "custom 2048");
    }

    #[test]
    fn test_bundled_template_exists() {
        let renderer = TemplateRenderer::default();
        assert!(renderer.template_path(DEFAULT_TEMPLATE_NAME).is_ok());
    }

    #[test]
    fn test_extract_variable_name() {
        assert_eq!(
            extract_variable_name("Variable `oss_id` not found in context while rendering 'x'"),
            Some("oss_id".to_string())
        );
        assert_eq!(extract_variable_name("Failed to render 'x'"), None);
    }
}
