//! Conversion orchestrator.
//!
//! This module runs the full conversion:
//! 1. Read and parse the VirtualBox descriptor
//! 2. Extract the field groups and apply caller overrides
//! 3. Render the target template
//! 4. Write the rendered descriptor
//!
//! # Example
//!
//! ```no_run
//! use vbox2vm_core::convert::{convert_ovf, ConvertOptions};
//! use std::path::Path;
//!
//! let input = Path::new("/path/to/packer.ovf");
//! let output = Path::new("/path/to/vsphere.ovf");
//!
//! convert_ovf(input, output, &ConvertOptions::default(), None).unwrap();
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::context::{Overrides, RenderContext};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::extract::Ovf;
use crate::render::{TemplateRenderer, DEFAULT_TEMPLATE_DIR, DEFAULT_TEMPLATE_NAME};

/// Options for a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Template file name inside `template_dir`.
    pub template_name: String,
    /// Directory holding the templates.
    pub template_dir: PathBuf,
    /// Values replacing extracted ones before rendering.
    pub overrides: Overrides,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            template_name: DEFAULT_TEMPLATE_NAME.to_string(),
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            overrides: Overrides::vsphere_defaults(),
        }
    }
}

impl ConvertOptions {
    /// Create new options with specified settings.
    pub fn new(
        template_name: impl Into<String>,
        template_dir: impl Into<PathBuf>,
        overrides: Overrides,
    ) -> Self {
        Self {
            template_name: template_name.into(),
            template_dir: template_dir.into(),
            overrides,
        }
    }

    pub fn with_template_name(mut self, name: impl Into<String>) -> Self {
        self.template_name = name.into();
        self
    }

    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = dir.into();
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// A renderer bound to `template_dir`.
    pub fn renderer(&self) -> TemplateRenderer {
        TemplateRenderer::new(&self.template_dir)
    }
}

/// Phase of the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertPhase {
    /// Reading and parsing the source descriptor.
    Reading,
    /// Extracting field groups and applying overrides.
    Extracting,
    /// Rendering the target template.
    Rendering,
    /// Writing the output file.
    Writing,
    /// Conversion complete.
    Complete,
}

impl std::fmt::Display for ConvertPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertPhase::Reading => write!(f, "Reading"),
            ConvertPhase::Extracting => write!(f, "Extracting"),
            ConvertPhase::Rendering => write!(f, "Rendering"),
            ConvertPhase::Writing => write!(f, "Writing"),
            ConvertPhase::Complete => write!(f, "Complete"),
        }
    }
}

/// Type alias for the progress callback function.
pub type ProgressCallback = Box<dyn Fn(ConvertPhase) + Send>;

/// Summary of a finished conversion.
#[derive(Debug, Clone)]
pub struct ConvertReport {
    /// Where the descriptor was written.
    pub output_path: PathBuf,
    /// Template that was rendered.
    pub template_name: String,
    /// Overrides applied on top of the extracted values.
    pub overrides: Overrides,
    /// The context the template was rendered with.
    pub context: RenderContext,
    /// Size of the written descriptor in bytes.
    pub bytes_written: usize,
}

/// Read a descriptor and build its rendering context with `overrides`
/// applied.
pub fn make_context(input: &Path, overrides: &Overrides) -> Result<RenderContext> {
    let doc = Document::open(input)?;
    Ovf::new(&doc).update(overrides)
}

/// Write rendered text to `output`, replacing any existing file.
pub fn save(text: &str, output: &Path) -> Result<()> {
    fs::write(output, text).map_err(|e| Error::io(e, output))
}

/// Convert a VirtualBox descriptor into the target template's format.
///
/// # Arguments
///
/// * `input` - Path to the source OVF descriptor.
/// * `output` - Path for the rendered descriptor. Its directory must exist.
/// * `options` - Template selection and overrides.
/// * `progress_callback` - Optional callback notified on each phase.
///
/// # Errors
///
/// The first failing step aborts the conversion; nothing is written unless
/// rendering succeeded.
pub fn convert_ovf(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<ConvertReport> {
    let report_progress = |phase: ConvertPhase| {
        if let Some(ref callback) = progress_callback {
            callback(phase);
        }
    };

    report_progress(ConvertPhase::Reading);
    info!(input = %input.display(), "reading descriptor");
    let doc = Document::open(input)?;

    report_progress(ConvertPhase::Extracting);
    let context = Ovf::new(&doc).update(&options.overrides)?;

    report_progress(ConvertPhase::Rendering);
    info!(
        template = %options.template_name,
        dir = %options.template_dir.display(),
        "rendering template"
    );
    let rendered = options.renderer().render(&options.template_name, &context)?;

    report_progress(ConvertPhase::Writing);
    save(&rendered, output)?;
    info!(output = %output.display(), bytes = rendered.len(), "descriptor written");

    report_progress(ConvertPhase::Complete);

    Ok(ConvertReport {
        output_path: output.to_path_buf(),
        template_name: options.template_name.clone(),
        overrides: options.overrides.clone(),
        context,
        bytes_written: rendered.len(),
    })
}
