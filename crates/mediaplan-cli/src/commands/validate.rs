//! Plan validation

use std::path::PathBuf;

use clap::Args;
use mediaplan_schema::{DocumentValidator, SchemaValidator, Severity};

use super::{read_document, Context};
use crate::output::{print_error, print_json, print_success, print_warning, OutputFormat};

#[derive(Args)]
pub struct ValidateArgs {
    /// Plan JSON file
    pub file: PathBuf,

    /// Validate against this version instead of the plan's own
    #[arg(long)]
    pub version: Option<String>,
}

pub fn execute(args: ValidateArgs, ctx: &Context) -> anyhow::Result<()> {
    let validator = DocumentValidator::new(ctx.config.registry()?);
    let document = read_document(&args.file)?;
    let issues = validator.validate(&document, args.version.as_deref())?;
    let errors = issues.iter().filter(|i| i.is_error()).count();

    match ctx.format {
        OutputFormat::Json => print_json(&issues)?,
        OutputFormat::Text => {
            for issue in &issues {
                let line = format!("{}: {}", issue.path, issue.message);
                match issue.severity {
                    Severity::Error => print_error(&line),
                    Severity::Warning => print_warning(&line),
                }
            }
            if errors == 0 {
                print_success(&format!(
                    "{} is valid ({} warning(s))",
                    args.file.display(),
                    issues.len()
                ));
            }
        }
    }

    if errors > 0 {
        anyhow::bail!("{} has {} validation error(s)", args.file.display(), errors);
    }
    Ok(())
}
