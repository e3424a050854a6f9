use std::path::Path;

use arcstr::ArcStr;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, warn};
use regex::Regex;

use crate::cli::args::Args;
use crate::config::{parse_extract_config, ExtractConfig};
use crate::extract::collect::collect;
use crate::extract::connect::connect_all;
use crate::extract::post::{check_multi_pads, implicit_pin_connect, PadViolation};
use crate::extract::simplify::simplify_design;
use crate::extract::{Extractor, PadKey};
use crate::layout::{gds, Library};
use crate::netlist::{write_debug_gds, write_spice};
use crate::{anyhow, Result};

pub mod args;

pub fn run() -> Result<()> {
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => parse_extract_config(path)?,
        None => ExtractConfig::default(),
    };

    println!("Reading layout {} ...", args.gds.display());
    let mut lib = gds::read_gds(&args.gds)?;

    let violations = execute(&mut lib, &cfg, &args.spice, args.debug_gds.as_deref())?;

    println!("Netlist saved to {}", args.spice.display());
    if violations.is_empty() {
        println!("{}", "All pads fully connected".green());
        Ok(())
    } else {
        println!(
            "{}",
            format!("{} pad(s) not fully connected", violations.len()).red()
        );
        Err(anyhow!("extraction found incompletely connected pads"))
    }
}

/// Runs the extraction pipeline over a loaded layout and writes both
/// artifacts. Violations are returned rather than raised: one broken pad
/// must not suppress the outputs or any other diagnostic.
pub fn execute(
    lib: &mut Library,
    cfg: &ExtractConfig,
    spice: &Path,
    debug_gds: Option<&Path>,
) -> Result<Vec<PadViolation>> {
    let stack = cfg.layer_stack()?;

    let mut patterns = Vec::new();
    for rule in &cfg.implicit_connect {
        let re = Regex::new(&rule.pattern)
            .map_err(|e| anyhow!("bad implicit-connect pattern `{}`: {e}", rule.pattern))?;
        patterns.push(re);
    }

    for rule in &cfg.promote_pins {
        if lib.cell(&rule.cell).is_none() {
            warn!("pin promotion: cell `{}` not in library", rule.cell);
            continue;
        }
        lib.promote_pins(
            &rule.cell,
            rule.layer,
            &ArcStr::from(rule.pin.as_str()),
            cfg.drawing_datatype,
            cfg.pin_datatype,
            cfg.pin_name_attr,
        )?;
    }

    let top = match &cfg.top {
        Some(name) => {
            lib.cell(name)
                .ok_or_else(|| anyhow!("top cell `{name}` not found"))?;
            name.clone()
        }
        None => lib.top_cell()?.name.to_string(),
    };

    let pb = ProgressBar::new(4);
    pb.set_style(
        ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=> "),
    );

    pb.set_message("flattening via cells");
    lib.flatten_instances(&top, |name| name.starts_with(&cfg.via_cell_prefix))?;
    pb.inc(1);

    pb.set_message("simplifying cell types");
    let simplified = simplify_design(lib, &top, &stack, cfg)?;
    pb.inc(1);

    pb.set_message("collecting layer populations");
    let mut ex = Extractor::new();
    collect(&mut ex, lib, &top, &simplified, &stack, cfg)?;
    pb.inc(1);

    pb.set_message("connecting nets");
    connect_all(&mut ex, &stack);
    pb.inc(1);
    pb.finish_and_clear();

    log::info!(
        "extracted {} polygons from {} instances into {} nets",
        ex.poly_count(),
        ex.refs().len(),
        ex.net_count()
    );

    for re in &patterns {
        implicit_pin_connect(&mut ex, re);
    }

    let violations = check_multi_pads(&ex);
    for v in &violations {
        error!("{v}");
    }

    for name in cfg.expected_pad_names() {
        ex.seed_pad(PadKey {
            inst: None,
            pin: ArcStr::from(name),
        });
    }

    if let Some(path) = debug_gds {
        write_debug_gds(&ex, lib, &top, &simplified, cfg, path)?;
    }
    write_spice(&ex, &top, spice)?;

    Ok(violations)
}
