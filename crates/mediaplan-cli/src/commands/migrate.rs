//! Single-plan migration

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use mediaplan_schema::{recommendation, SchemaMigrator};

use super::{read_document, write_document, Context};
use crate::output::{print_field, print_json, print_success, print_warning, OutputFormat};

#[derive(Args)]
pub struct MigrateArgs {
    /// Plan JSON file
    pub file: PathBuf,

    /// Target schema version (defaults to the configured current version)
    #[arg(long)]
    pub to: Option<String>,

    /// Write the migrated plan here instead of in place
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Only report whether and how the plan can be migrated
    #[arg(long)]
    pub check: bool,
}

pub fn execute(args: MigrateArgs, ctx: &Context) -> anyhow::Result<()> {
    let registry = ctx.config.registry()?;
    let migrator = SchemaMigrator::new(registry.clone());
    let document = read_document(&args.file)?;
    let from = document
        .get("meta")
        .and_then(|m| m.get("schema_version"))
        .and_then(|v| v.as_str())
        .with_context(|| format!("{} has no meta.schema_version", args.file.display()))?
        .to_string();
    let to = args
        .to
        .unwrap_or_else(|| registry.current_version().to_string());

    if args.check {
        let report = migrator.check_compatibility(&from, &to);
        let advice = recommendation(
            &from,
            registry.current_version(),
            &registry.supported_majors(),
        );
        match ctx.format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "migration": report,
                "recommendation": advice,
            }))?,
            OutputFormat::Text => {
                println!("{} -> {}", from, to);
                print_field("compatible", report.compatible);
                print_field("compatibility", advice.compatibility);
                let path: Vec<String> = report.path.iter().map(|v| v.to_string()).collect();
                print_field("path", path.join(" -> "));
                print_field("recommendation", &advice.message);
                for warning in &report.warnings {
                    print_warning(warning);
                }
                for error in &report.errors {
                    print_warning(error);
                }
            }
        }
        return Ok(());
    }

    let migrated = migrator.migrate(&document, &from, &to)?;
    if migrated == document {
        print_success(&format!("{} is already at {}", args.file.display(), to));
        return Ok(());
    }
    let written = write_document(&args.file, args.out.as_deref(), &migrated)?;
    match ctx.format {
        OutputFormat::Json => print_json(&migrated["meta"])?,
        OutputFormat::Text => print_success(&format!(
            "migrated {} from {} to {} -> {}",
            args.file.display(),
            from,
            to,
            written.display()
        )),
    }
    Ok(())
}
