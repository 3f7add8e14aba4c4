//! Error types for the vbox2vm core library.

use std::path::PathBuf;

/// The main error type for vbox2vm operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input descriptor does not exist.
    #[error("file not found: '{}'", path.display())]
    NotFound { path: PathBuf },

    /// I/O error with optional path context.
    #[error("I/O error{}: {source}", path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    /// The descriptor is not well-formed XML.
    #[error("XML parse error: {message}")]
    XmlParse { message: String },

    /// An element or attribute the extractor needs is absent.
    #[error("missing element: {element}")]
    MissingElement { element: String },

    /// An element was found but its value could not be interpreted.
    #[error("invalid value for {field}: '{value}'")]
    InvalidValue { field: String, value: String },

    /// The requested template does not exist in the template directory.
    #[error("template not found: '{name}' in '{}'", dir.display())]
    TemplateNotFound { name: String, dir: PathBuf },

    /// The template references a placeholder the context does not provide.
    #[error("template '{template}' references missing key '{key}'")]
    MissingKey { template: String, key: String },

    /// Any other template compilation or rendering failure.
    #[error("template error: {message}")]
    Template { message: String },
}

/// A specialized Result type for vbox2vm operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// Create an I/O error without path context.
    pub fn io_simple(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }

    /// Create a not-found error for the given path.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an XML parse error.
    pub fn xml_parse(message: impl Into<String>) -> Self {
        Self::XmlParse {
            message: message.into(),
        }
    }

    /// Create a missing element error.
    pub fn missing_element(element: impl Into<String>) -> Self {
        Self::MissingElement {
            element: element.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Create a template error.
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io_simple(source)
    }
}
