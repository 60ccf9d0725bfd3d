//! Metric formula commands

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Subcommand;
use mediaplan_formulas::{
    select_formula_for_media_plan, set_metric_value, FormulaSelection, MetricValue,
};
use mediaplan_types::{Decimal, FormulaType, MediaPlan};
use mediaplan_workspace::PlanLoader;

use super::{read_document, write_document, Context};
use crate::output::{print_field, print_json, print_success, print_warning, OutputFormat};

/// Formula subcommands
#[derive(Subcommand)]
pub enum FormulaCommands {
    /// Show a metric's value and formula on one line item
    Show {
        /// Plan JSON file
        file: PathBuf,
        #[arg(long)]
        lineitem: String,
        #[arg(long)]
        metric: String,
    },

    /// Set a metric value and recalculate its dependents
    Set {
        /// Plan JSON file
        file: PathBuf,
        #[arg(long)]
        lineitem: String,
        #[arg(long)]
        metric: String,
        #[arg(long)]
        value: Decimal,
        /// Also solve the metric's own coefficient for the new value
        #[arg(long)]
        update_coefficient: bool,
        /// Write the plan here instead of in place
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Select the formula a metric uses across the plan
    Select {
        /// Plan JSON file
        file: PathBuf,
        #[arg(long)]
        metric: String,
        #[arg(long)]
        formula_type: Option<FormulaType>,
        #[arg(long)]
        base_metric: Option<String>,
        /// Coefficient for line items whose values are not preserved
        #[arg(long)]
        coefficient: Option<Decimal>,
        /// Only update the dictionary
        #[arg(long)]
        no_propagate: bool,
        /// Apply the default coefficient instead of preserving values
        #[arg(long)]
        no_preserve: bool,
        /// Write the plan here instead of in place
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn load(file: &Path, ctx: &Context) -> anyhow::Result<MediaPlan> {
    let loader = PlanLoader::new(ctx.config.registry()?);
    let loaded = loader.load_document(&read_document(file)?)?;
    if loaded.migrated {
        print_warning(&format!(
            "{} was migrated from schema {} in memory",
            file.display(),
            loaded.source_version
        ));
    }
    Ok(loaded.plan)
}

fn save(plan: &MediaPlan, file: &Path, out: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    write_document(file, out.as_deref(), &plan.to_document()?)
}

/// Execute a formula command
pub fn execute(command: FormulaCommands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        FormulaCommands::Show {
            file,
            lineitem,
            metric,
        } => {
            let plan = load(&file, ctx)?;
            let item = plan
                .lineitem(&lineitem)
                .with_context(|| format!("line item '{lineitem}' not found"))?;
            let view = MetricValue::of(item, plan.dictionary.as_ref(), &metric);
            match ctx.format {
                OutputFormat::Json => print_json(&view)?,
                OutputFormat::Text => {
                    println!("{} / {}", lineitem, metric);
                    let show = |v: Option<Decimal>| {
                        v.map_or("-".to_string(), |d| d.normalize().to_string())
                    };
                    print_field("value", show(view.value));
                    print_field("formula_type", view.formula_type);
                    print_field("base_metric", view.base_metric.as_deref().unwrap_or("-"));
                    print_field("coefficient", show(view.coefficient));
                    print_field("parameter1", show(view.parameter1));
                    if let Some(cpm) = view.cpm() {
                        print_field("cpm", cpm.normalize());
                    }
                }
            }
        }

        FormulaCommands::Set {
            file,
            lineitem,
            metric,
            value,
            update_coefficient,
            out,
        } => {
            let mut plan = load(&file, ctx)?;
            let dictionary = plan.dictionary.clone();
            let item = plan
                .lineitem_mut(&lineitem)
                .with_context(|| format!("line item '{lineitem}' not found"))?;
            let changed = set_metric_value(
                item,
                dictionary.as_ref(),
                &metric,
                value,
                update_coefficient,
            )?;
            let written = save(&plan, &file, out)?;
            match ctx.format {
                OutputFormat::Json => print_json(&changed)?,
                OutputFormat::Text => {
                    print_success(&format!(
                        "set {metric} = {value} on {lineitem} -> {}",
                        written.display()
                    ));
                    for dependent in &changed {
                        print_field("recalculated", dependent);
                    }
                }
            }
        }

        FormulaCommands::Select {
            file,
            metric,
            formula_type,
            base_metric,
            coefficient,
            no_propagate,
            no_preserve,
            out,
        } => {
            let mut plan = load(&file, ctx)?;
            let selection = FormulaSelection {
                formula_type,
                base_metric,
                default_coefficient: coefficient,
                propagate_to_line_items: !no_propagate,
                preserve_values: !no_preserve,
                ..Default::default()
            };
            let report = select_formula_for_media_plan(&mut plan, &metric, &selection)?;
            let written = save(&plan, &file, out)?;
            match ctx.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => {
                    print_success(&format!(
                        "selected formula for {metric} -> {}",
                        written.display()
                    ));
                    print_field("dictionary updated", report.dictionary_updated);
                    print_field("line items updated", report.lineitems_updated);
                    print_field("coefficients recalculated", report.coefficients_recalculated);
                    for id in &report.unresolved {
                        print_warning(&format!("{id}: value could not be preserved"));
                    }
                }
            }
        }
    }
    Ok(())
}
