//! vbox2vm Core Library
//!
//! This crate converts OVF descriptors exported by VirtualBox (typically from
//! a Packer build) into OVF descriptors that VMware vSphere accepts.
//!
//! # Overview
//!
//! The conversion is a single linear pipeline: parse the source descriptor,
//! extract a fixed set of fields, apply caller overrides, render a target
//! template and write the result. The main entry point is [`convert_ovf`].
//!
//! # Modules
//!
//! - [`error`] - Error types and Result alias
//! - [`document`] - Case-insensitive XML element tree
//! - [`extract`] - Field extraction from the parsed descriptor
//! - [`context`] - Rendering context and overrides
//! - [`render`] - Template rendering bound to a template directory
//! - [`convert`] - Orchestrator and output writer
//!
//! # Quick Start
//!
//! ```no_run
//! use vbox2vm_core::{convert_ovf, ConvertOptions};
//! use std::path::Path;
//!
//! let input = Path::new("/path/to/packer.ovf");
//! let output = Path::new("/path/to/vsphere.ovf");
//!
//! convert_ovf(input, output, &ConvertOptions::default(), None).unwrap();
//! ```

pub mod context;
pub mod convert;
pub mod document;
pub mod error;
pub mod extract;
pub mod render;

pub use error::{Error, Result};

pub use context::{ContextValue, Overrides, RenderContext, CONTEXT_KEYS};
pub use convert::{
    convert_ovf, make_context, save, ConvertOptions, ConvertPhase, ConvertReport,
    ProgressCallback,
};
pub use document::Document;
pub use extract::Ovf;
pub use render::{TemplateRenderer, DEFAULT_TEMPLATE_DIR, DEFAULT_TEMPLATE_NAME};
