//! Per-layer population build: the top cell's own merged drawing, its own
//! named pads, and every instance's simplified pad shapes, sorted for the
//! connectivity sweeps.

use crate::config::ExtractConfig;
use crate::geom;
use crate::layout::Library;
use crate::stack::LayerStack;
use crate::{anyhow, Result};

use super::simplify::{shape_region, Simplified};
use super::{Extractor, PadKey, Polygon, RefInfo};

pub fn collect(
    ex: &mut Extractor,
    lib: &Library,
    top: &str,
    simplified: &Simplified,
    stack: &LayerStack,
    cfg: &ExtractConfig,
) -> Result<()> {
    let top_cell = lib
        .cell(top)
        .ok_or_else(|| anyhow!("top cell `{top}` not found"))?;

    let inst_ids: Vec<_> = top_cell
        .insts
        .iter()
        .map(|inst| {
            ex.add_ref(RefInfo {
                cell: inst.cell.clone(),
                trans: inst.trans,
            })
        })
        .collect();

    for &layer in stack.metals() {
        // The top cell's own routing, self-overlaps merged so the sweep sees
        // each connected piece once.
        let own: Vec<_> = top_cell
            .shapes_on(layer, cfg.drawing_datatype)
            .filter_map(|s| shape_region(s, top))
            .collect();
        for poly in geom::or(&own) {
            ex.add_polygon(Polygon::new(layer, poly, None));
        }

        // The top design's own named pads.
        for pin in simplified.top.pins.iter().filter(|p| p.layer == layer) {
            ex.add_polygon(Polygon::new(
                layer,
                pin.poly.clone(),
                Some(PadKey {
                    inst: None,
                    pin: pin.name.clone(),
                }),
            ));
        }

        // Each placed instance contributes its simplified pad shapes,
        // moved into top coordinates.
        for (inst, &inst_id) in top_cell.insts.iter().zip(&inst_ids) {
            let Some(sc) = simplified.cells.get(&inst.cell) else {
                continue;
            };
            for pin in sc.pins.iter().filter(|p| p.layer == layer) {
                let poly = pin.poly.transformed(|p| inst.trans.apply(p));
                ex.add_polygon(Polygon::new(
                    layer,
                    poly,
                    Some(PadKey {
                        inst: Some(inst_id),
                        pin: pin.name.clone(),
                    }),
                ));
            }
        }

        ex.sort_layer(layer);
    }

    for &layer in stack.vias() {
        let own: Vec<_> = top_cell
            .shapes_on(layer, cfg.drawing_datatype)
            .filter_map(|s| shape_region(s, top))
            .collect();
        for poly in geom::or(&own) {
            ex.add_polygon(Polygon::new(layer, poly, None));
        }
        ex.sort_layer(layer);
    }

    Ok(())
}
