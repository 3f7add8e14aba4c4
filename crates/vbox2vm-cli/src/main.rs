//! vbox2vm CLI - Convert VirtualBox OVF descriptors for VMware vSphere.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use vbox2vm_core::context::{
    DEFAULT_OSS_DESCRIPTION, DEFAULT_OSS_ID, DEFAULT_OSS_TYPE, DEFAULT_VIRTUAL_SYSTEM_TYPE,
};
use vbox2vm_core::{
    convert_ovf, ConvertOptions, ConvertPhase, Overrides, TemplateRenderer, DEFAULT_TEMPLATE_DIR,
    DEFAULT_TEMPLATE_NAME,
};

/// Convert an OVF descriptor exported by VirtualBox into one VMware vSphere accepts.
#[derive(Parser, Debug)]
#[command(name = "vbox2vm")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source OVF descriptor.
    #[arg(required_unless_present = "list_templates")]
    ovfin: Option<PathBuf>,

    /// Output path for the converted descriptor.
    #[arg(required_unless_present = "list_templates")]
    ovfout: Option<PathBuf>,

    /// Template used to render the output descriptor.
    #[arg(long, alias = "template_name", default_value = DEFAULT_TEMPLATE_NAME)]
    template_name: String,

    /// Directory containing the templates.
    ///
    /// The default is the build-time source path. If it no longer exists, the
    /// default template still renders from the copy compiled into the binary.
    #[arg(long, alias = "template_dir", env = "VBOX2VM_TEMPLATE_DIR", default_value = DEFAULT_TEMPLATE_DIR)]
    template_dir: PathBuf,

    /// VMware guest OS code (107 is the Red Hat family).
    #[arg(long, alias = "oss_id", default_value_t = DEFAULT_OSS_ID)]
    oss_id: i64,

    /// VMware guest OS description.
    #[arg(long, alias = "oss_description", default_value = DEFAULT_OSS_DESCRIPTION)]
    oss_description: String,

    /// VMware guest OS type.
    #[arg(long, alias = "oss_type", default_value = DEFAULT_OSS_TYPE)]
    oss_type: String,

    /// VMware virtual hardware version.
    #[arg(long, alias = "virtual_system_type", default_value = DEFAULT_VIRTUAL_SYSTEM_TYPE)]
    virtual_system_type: String,

    /// List the templates in the template directory and exit.
    #[arg(long)]
    list_templates: bool,

    /// Suppress progress output.
    #[arg(short, long)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides::new()
            .with_oss_id(self.oss_id)
            .with_oss_description(self.oss_description.as_str())
            .with_oss_type(self.oss_type.as_str())
            .with_virtual_system_type(self.virtual_system_type.as_str())
    }

    fn options(&self) -> ConvertOptions {
        ConvertOptions::new(
            self.template_name.as_str(),
            self.template_dir.as_path(),
            self.overrides(),
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list_templates {
        return list_templates(&cli.template_dir);
    }

    let input = cli.ovfin.as_deref().context("missing source descriptor path")?;
    let output = cli.ovfout.as_deref().context("missing output path")?;
    run_convert(&cli, input, output)
}

fn init_logging(verbose: u8) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(level)
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn list_templates(template_dir: &Path) -> Result<()> {
    let renderer = TemplateRenderer::new(template_dir);
    let names = renderer
        .available_templates()
        .with_context(|| format!("listing templates in '{}'", template_dir.display()))?;

    for name in names {
        println!("{}", name);
    }
    Ok(())
}

fn run_convert(cli: &Cli, input: &Path, output: &Path) -> Result<()> {
    let options = cli.options();
    tracing::debug!(?options, "resolved conversion options");

    if !cli.quiet {
        println!("Reading ovf file: {}", input.display());
    }

    let spinner = if cli.quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    };

    let last_phase = Arc::new(Mutex::new(ConvertPhase::Reading));
    let callback: vbox2vm_core::ProgressCallback = {
        let last_phase = Arc::clone(&last_phase);
        let spinner = spinner.clone();
        Box::new(move |phase: ConvertPhase| {
            *last_phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
            if let Some(ref pb) = spinner {
                pb.set_message(format!("{}...", phase));
            }
        })
    };

    let result = convert_ovf(input, output, &options, Some(callback));

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let report = result.with_context(|| {
        let phase = *last_phase.lock().unwrap_or_else(|e| e.into_inner());
        describe_failure(phase, input, output, &options)
    })?;

    if !cli.quiet {
        println!("Generating OVF vSphere file with params:");
        println!(
            "oss_id: {}, oss_description: {}, oss_type: {}, virtual_system_type: {}",
            cli.oss_id, cli.oss_description, cli.oss_type, cli.virtual_system_type
        );
        println!("Template:  {}", report.template_name);
        println!(
            "Saved updated ovf file: {} ({} bytes)",
            report.output_path.display(),
            report.bytes_written
        );
    }

    Ok(())
}

/// Name the step that failed for the user-facing diagnostic.
fn describe_failure(
    phase: ConvertPhase,
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> String {
    match phase {
        ConvertPhase::Reading => format!("reading '{}' failed", input.display()),
        ConvertPhase::Extracting => {
            format!("extracting fields from '{}' failed", input.display())
        }
        ConvertPhase::Rendering => format!(
            "rendering template '{}' from '{}' failed",
            options.template_name,
            options.template_dir.display()
        ),
        ConvertPhase::Writing | ConvertPhase::Complete => {
            format!("writing '{}' failed", output.display())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use vbox2vm_core::ContextValue;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["vbox2vm", "in.ovf", "out.ovf"]).unwrap();
        assert_eq!(cli.template_name, "centos7.ovf.j2");
        assert_eq!(cli.oss_id, 107);
        assert_eq!(cli.oss_description, "CentOS 4/5/6/7 (64-bit)");
        assert_eq!(cli.oss_type, "rhel7_64Guest");
        assert_eq!(cli.virtual_system_type, "vmx-10");
        assert!(!cli.quiet);
    }

    #[test]
    fn test_underscore_aliases() {
        let cli = Cli::try_parse_from([
            "vbox2vm",
            "in.ovf",
            "out.ovf",
            "--oss_id",
            "80",
            "--virtual_system_type",
            "vmx-7",
            "--template_name",
            "other.ovf.j2",
        ])
        .unwrap();
        assert_eq!(cli.oss_id, 80);
        assert_eq!(cli.virtual_system_type, "vmx-7");
        assert_eq!(cli.template_name, "other.ovf.j2");
    }

    #[test]
    fn test_positionals_required() {
        assert!(Cli::try_parse_from(["vbox2vm", "in.ovf"]).is_err());
        assert!(Cli::try_parse_from(["vbox2vm", "--list-templates"]).is_ok());
    }

    #[test]
    fn test_options_carry_overrides() {
        let cli = Cli::try_parse_from(["vbox2vm", "in.ovf", "out.ovf", "--oss-type", "rhel7"])
            .unwrap();
        let options = cli.options();
        assert_eq!(
            options.overrides.get("oss_type"),
            Some(&ContextValue::from("rhel7"))
        );
        assert_eq!(
            options.overrides.get("oss_id"),
            Some(&ContextValue::Integer(107))
        );
    }

    #[test]
    fn test_describe_failure_names_step() {
        let options = ConvertOptions::default();
        let msg = describe_failure(
            ConvertPhase::Rendering,
            Path::new("in.ovf"),
            Path::new("out.ovf"),
            &options,
        );
        assert!(msg.starts_with("rendering template 'centos7.ovf.j2'"));

        let msg = describe_failure(
            ConvertPhase::Writing,
            Path::new("in.ovf"),
            Path::new("out.ovf"),
            &options,
        );
        assert_eq!(msg, "writing 'out.ovf' failed");
    }
}
