//! Inspect command handler.
//!
//! Shows what a conversion would read without writing anything.

use bmconv_core::layout::DEFAULT_ARCHITECTURE;
use bmconv_core::{TensorSource, WeightPlan, resolve};
use bmconv_gguf::GgufContainer;

use crate::commands::InspectArgs;
use crate::error::CliError;
use crate::input::{Input, OpenOptions, open_input};
use crate::presentation::{print_config, print_separator, truncate_string};

/// Resolution of one plan slot against a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotResolution {
    pub slot: String,
    /// The first alias the source contains.
    pub found: Option<String>,
    pub attempted: Vec<String>,
}

/// Resolve every slot of `plan` against `source`, in plan order.
pub fn resolve_slots(plan: &WeightPlan, source: &dyn TensorSource) -> Vec<SlotResolution> {
    plan.slots()
        .iter()
        .map(|&slot| {
            let attempted = plan.aliases(slot);
            let found = attempted.iter().find(|alias| source.contains(alias)).cloned();
            SlotResolution {
                slot: slot.to_string(),
                found,
                attempted,
            }
        })
        .collect()
}

fn print_gguf(container: &GgufContainer) {
    println!("\nGGUF version {}, data at offset {}", container.version(), container.data_start());
    println!("\nMetadata:");
    for (key, value) in container.metadata() {
        println!("  {key} = {}", truncate_string(&value.to_string(), 60));
    }
    for warning in container.warnings() {
        println!("  ! {warning}");
    }

    println!("\n{:<40} {:<8} {:<20} Offset", "Tensor", "Dtype", "Dims");
    print_separator(80);
    for info in container.tensors() {
        println!(
            "{:<40} {:<8} {:<20} {}",
            truncate_string(&info.name, 39),
            info.dtype.to_string(),
            format!("{:?}", info.dims),
            info.offset
        );
    }
}

/// Execute the inspect command.
pub fn execute(args: &InspectArgs) -> Result<(), CliError> {
    let architecture = args.arch.as_deref().unwrap_or(DEFAULT_ARCHITECTURE);
    let (input, config) = open_input(
        &args.input,
        OpenOptions {
            architecture,
            hf_config: args.hf_config.as_deref(),
            input_header: args.input_header.map(Into::into),
        },
    )?;

    println!("{}", input.source().label());
    print_config(&config);

    match &input {
        Input::Gguf(source) => print_gguf(source.container()),
        Input::Safetensors(_) | Input::Stream(_) => {
            println!("\n{} tensors", input.source().tensor_names().len());
        }
    }

    let plan = resolve(architecture, &config)?;
    println!("\nWeight plan for {} ({} slots):", plan.architecture().tag, plan.len());
    print_separator(80);
    let resolutions = resolve_slots(&plan, input.source());
    for resolution in &resolutions {
        match &resolution.found {
            Some(name) => println!("  {:<28} {name}", resolution.slot),
            None => println!(
                "  {:<28} MISSING (tried {})",
                resolution.slot,
                resolution.attempted.join(", ")
            ),
        }
    }
    let missing = resolutions.iter().filter(|r| r.found.is_none()).count();
    if missing > 0 {
        println!("\n{missing} slot(s) would be skipped (or fail with --strict)");
    }
    Ok(())
}
