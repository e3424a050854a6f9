//! Structural SPICE emission: black-box stubs for every placed macro type
//! and a top subcircuit tying named pads to extracted nets, plus the
//! optional per-net debug layout.

use std::fs;
use std::path::Path;

use arcstr::ArcStr;
use itertools::Itertools;
use log::warn;

use crate::config::ExtractConfig;
use crate::extract::simplify::{Simplified, SimplifiedCell};
use crate::extract::{Extractor, PadKey};
use crate::geom::BoundingBox;
use crate::layout::{gds, Cell, Label, Library, Shape};
use crate::utils::natural_cmp;
use crate::{anyhow, Result};

const MAX_LINE: usize = 80;

pub fn write_spice(ex: &Extractor, top: &str, path: impl AsRef<Path>) -> Result<()> {
    let lines = split_lines(netlist_lines(ex, top));
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, lines.join("\n") + "\n")?;
    Ok(())
}

/// The unwrapped netlist, one logical statement per line.
pub fn netlist_lines(ex: &Extractor, top: &str) -> Vec<String> {
    let (top_pins, stubs) = pad_name_lists(ex);
    let mut lines = Vec::new();

    // Empty stub per macro type: pins only, body intentionally blank.
    for (ty, pins) in &stubs {
        lines.push(format!(".subckt {} {}", ty, pins.iter().join(" ")));
        lines.push(".ends".to_string());
    }

    lines.push(format!(".subckt {} {}", top, top_pins.iter().join(" ")));

    // Zero-resistance ties keep pad names and internal net ids as separate
    // namespaces while staying electrically identical.
    for (k, pin) in top_pins.iter().enumerate() {
        let key = PadKey {
            inst: None,
            pin: pin.clone(),
        };
        if let Some(net) = ex.pad_net(&key) {
            lines.push(format!("R{k} {pin} net_{} 0", net.0));
        }
    }

    let mut floating = 0usize;
    for (k, (inst_id, info)) in ex.refs_with_ids().enumerate() {
        let pins = stubs
            .iter()
            .find(|(ty, _)| *ty == info.cell)
            .map(|(_, pins)| pins.as_slice())
            .unwrap_or(&[]);
        let conns = pins
            .iter()
            .map(|pin| {
                let key = PadKey {
                    inst: Some(inst_id),
                    pin: pin.clone(),
                };
                match ex.pad_net(&key) {
                    Some(net) => format!("net_{}", net.0),
                    None => {
                        warn!(
                            "instance {k} of `{}` has no shape for pin `{pin}`, left floating",
                            info.cell
                        );
                        floating += 1;
                        format!("net_nc_{}", floating - 1)
                    }
                }
            })
            .join(" ");
        if conns.is_empty() {
            lines.push(format!("X{k} {}", info.cell));
        } else {
            lines.push(format!("X{k} {conns} {}", info.cell));
        }
    }

    lines.push(".ends".to_string());
    lines
}

/// Top-pad names and per-type stub pin lists, each in natural order.
fn pad_name_lists(ex: &Extractor) -> (Vec<ArcStr>, Vec<(ArcStr, Vec<ArcStr>)>) {
    let mut top: Vec<ArcStr> = Vec::new();
    let mut stubs: Vec<(ArcStr, Vec<ArcStr>)> = Vec::new();

    for (key, _) in ex.pads() {
        match key.inst {
            None => {
                if !top.contains(&key.pin) {
                    top.push(key.pin.clone());
                }
            }
            Some(inst) => {
                let ty = &ex.ref_info(inst).cell;
                let idx = match stubs.iter().position(|(t, _)| t == ty) {
                    Some(i) => i,
                    None => {
                        stubs.push((ty.clone(), Vec::new()));
                        stubs.len() - 1
                    }
                };
                let pins = &mut stubs[idx].1;
                if !pins.contains(&key.pin) {
                    pins.push(key.pin.clone());
                }
            }
        }
    }

    top.sort_by(|a, b| natural_cmp(a, b));
    for (_, pins) in &mut stubs {
        pins.sort_by(|a, b| natural_cmp(a, b));
    }
    (top, stubs)
}

/// Soft-wraps long lines on token boundaries with SPICE `+` continuations.
fn split_lines(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::new();
    for line in lines {
        if line.len() < MAX_LINE {
            out.push(line);
            continue;
        }
        let mut tokens = line.split(' ');
        let mut current = tokens.next().unwrap_or_default().to_string();
        for token in tokens {
            if current.len() + token.len() < MAX_LINE {
                current.push(' ');
                current.push_str(token);
            } else {
                out.push(current);
                current = format!("+ {token}");
            }
        }
        out.push(current);
    }
    out
}

/// Writes a GDS library for visual inspection: the simplified pin-only
/// cells, each top reference flattened, and one cell per extracted net
/// holding copies of that net's member shapes.
pub fn write_debug_gds(
    ex: &Extractor,
    lib: &Library,
    top: &str,
    simplified: &Simplified,
    cfg: &ExtractConfig,
    path: impl AsRef<Path>,
) -> Result<()> {
    let mut dbg = Library::new(format!("{top}_nets"));

    dbg.add_cell(bb_cell(&simplified.top, cfg));
    for sc in simplified
        .cells
        .values()
        .sorted_by(|a, b| a.name.cmp(&b.name))
    {
        dbg.add_cell(bb_cell(sc, cfg));
    }

    let top_cell = lib
        .cell(top)
        .ok_or_else(|| anyhow!("top cell `{top}` not found"))?;
    for (i, inst) in top_cell.insts.iter().enumerate() {
        let mut cell = Cell::new(format!("ref_{i}_{}", inst.cell));
        let mut shapes = Vec::new();
        let mut labels = Vec::new();
        lib.flatten_cell(&inst.cell, &inst.trans, &mut shapes, &mut labels)?;
        cell.shapes = shapes;
        cell.labels = labels;
        dbg.add_cell(cell);
    }

    for (net, members) in ex.nets().iter().sorted_by_key(|&(net, _)| *net) {
        let mut cell = Cell::new(format!("net_{}", net.0));
        for &id in members {
            let p = ex.poly(id);
            for rect in p.poly.rects() {
                cell.shapes
                    .push(rect_shape(p.layer, cfg.drawing_datatype, rect));
            }
        }
        dbg.add_cell(cell);
    }

    gds::write_gds(&dbg, path)?;
    Ok(())
}

/// Rebuilds a pin-only `<type>_bb` cell: drawn pin pieces on both the
/// drawing and pin datatypes, with a regenerated centroid label each.
fn bb_cell(sc: &SimplifiedCell, cfg: &ExtractConfig) -> Cell {
    let mut cell = Cell::new(format!("{}_bb", sc.name));
    for pin in &sc.pins {
        for rect in pin.poly.rects() {
            let mut shape = rect_shape(pin.layer, cfg.drawing_datatype, rect);
            shape.set_property(cfg.pin_name_attr, pin.name.clone());
            cell.shapes.push(shape.clone());
            shape.datatype = cfg.pin_datatype;
            cell.shapes.push(shape);
        }
        cell.labels.push(Label {
            layer: pin.layer,
            texttype: cfg.label_texttype,
            text: pin.name.clone(),
            origin: pin.poly.center(),
        });
    }
    cell
}

fn rect_shape(layer: i16, datatype: i16, r: &BoundingBox) -> Shape {
    use crate::geom::Point;
    Shape::new(
        layer,
        datatype,
        vec![
            Point::new(r.x0, r.y0),
            Point::new(r.x1, r.y0),
            Point::new(r.x1, r.y1),
            Point::new(r.x0, r.y1),
        ],
    )
}
