//! Cell simplification: reduces each distinct cell type to its named pin
//! geometry, once, so placed instances only contribute pad shapes.

use std::collections::HashMap;

use arcstr::ArcStr;
use log::warn;

use crate::config::ExtractConfig;
use crate::geom::{self, BoundingBox, Poly};
use crate::layout::{Cell, Label, Library, Shape};
use crate::stack::{LayerNum, LayerStack};
use crate::{anyhow, Result};

/// How a pin marker's name was resolved. Computed once during
/// simplification and consumed without re-derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinName {
    /// From a text label whose origin lies inside the marker.
    Label(ArcStr),
    /// From the marker's GDS name property.
    Property(ArcStr),
    /// No name could be found; the marker is useless and gets dropped.
    Unresolved,
}

impl PinName {
    pub fn get(&self) -> Option<&ArcStr> {
        match self {
            PinName::Label(name) | PinName::Property(name) => Some(name),
            PinName::Unresolved => None,
        }
    }
}

/// One piece of drawn pin geometry: the marker clipped to the drawing.
#[derive(Debug, Clone)]
pub struct SimplifiedPin {
    pub layer: LayerNum,
    pub name: ArcStr,
    pub poly: Poly,
}

/// The pin-only representation of a cell type.
#[derive(Debug, Clone)]
pub struct SimplifiedCell {
    pub name: ArcStr,
    pub pins: Vec<SimplifiedPin>,
}

/// Simplification results for a design: the top cell itself plus every
/// distinct referenced cell type, each simplified exactly once.
#[derive(Debug)]
pub struct Simplified {
    pub top: SimplifiedCell,
    pub cells: HashMap<ArcStr, SimplifiedCell>,
}

pub fn simplify_design(
    lib: &Library,
    top: &str,
    stack: &LayerStack,
    cfg: &ExtractConfig,
) -> Result<Simplified> {
    let top_cell = lib
        .cell(top)
        .ok_or_else(|| anyhow!("top cell `{top}` not found"))?;

    let mut cells = HashMap::new();
    for inst in &top_cell.insts {
        if cells.contains_key(&inst.cell) {
            continue;
        }
        let cell = lib
            .cell(&inst.cell)
            .ok_or_else(|| anyhow!("referenced cell `{}` not found", inst.cell))?;
        cells.insert(inst.cell.clone(), simplify_cell(cell, stack, cfg));
    }

    Ok(Simplified {
        top: simplify_cell(top_cell, stack, cfg),
        cells,
    })
}

/// Extracts the named, drawn pin geometry of one cell, metal layer by metal
/// layer. Markers that resolve to no name are dropped with a warning.
pub fn simplify_cell(cell: &Cell, stack: &LayerStack, cfg: &ExtractConfig) -> SimplifiedCell {
    let mut pins = Vec::new();

    for &layer in stack.metals() {
        let drawing: Vec<Poly> = cell
            .shapes_on(layer, cfg.drawing_datatype)
            .filter_map(|s| shape_region(s, &cell.name))
            .collect();
        let labels: Vec<&Label> = cell.labels_on(layer, cfg.label_texttype).collect();

        for marker_shape in cell.shapes_on(layer, cfg.pin_datatype) {
            let Some(marker) = shape_region(marker_shape, &cell.name) else {
                continue;
            };
            let name = resolve_pin_name(&marker, marker_shape, &labels, cfg, &cell.name);
            let Some(name) = name.get() else {
                warn!("pin without name ignored in `{}`", cell.name);
                continue;
            };
            for piece in geom::and(&marker, &drawing) {
                pins.push(SimplifiedPin {
                    layer,
                    name: name.clone(),
                    poly: piece,
                });
            }
        }
    }

    SimplifiedCell {
        name: cell.name.clone(),
        pins,
    }
}

fn resolve_pin_name(
    marker: &Poly,
    shape: &Shape,
    labels: &[&Label],
    cfg: &ExtractConfig,
    cell_name: &str,
) -> PinName {
    let mut matches = labels.iter().filter(|l| marker.contains_point(l.origin));
    if let Some(first) = matches.next() {
        if matches.next().is_some() {
            warn!(
                "pin with multiple labels in `{cell_name}`, using `{}`",
                first.text
            );
        }
        return PinName::Label(first.text.clone());
    }
    match shape.property(cfg.pin_name_attr) {
        Some(value) => PinName::Property(value.clone()),
        None => PinName::Unresolved,
    }
}

/// Converts a drawn outline into a region. Non-rectilinear outlines are
/// approximated by their bounding box; degenerate ones are skipped.
pub(crate) fn shape_region(shape: &Shape, cell_name: &str) -> Option<Poly> {
    use crate::geom::GeomError;

    match Poly::from_outline(&shape.points) {
        Ok(poly) => Some(poly),
        Err(GeomError::NotRectilinear) => {
            warn!(
                "non-rectilinear outline on layer {} of `{cell_name}`, using its bounding box",
                shape.layer
            );
            BoundingBox::from_points(&shape.points).map(Poly::from_rect)
        }
        Err(e) => {
            warn!("skipping shape on layer {} of `{cell_name}`: {e}", shape.layer);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Point;
    use crate::layout::{Instance, Transform};

    fn test_cfg() -> ExtractConfig {
        ExtractConfig::default()
    }

    fn stack() -> LayerStack {
        test_cfg().layer_stack().unwrap()
    }

    fn square(layer: LayerNum, dt: i16, x0: i64, y0: i64, size: i64) -> Shape {
        Shape::new(
            layer,
            dt,
            vec![
                Point::new(x0, y0),
                Point::new(x0 + size, y0),
                Point::new(x0 + size, y0 + size),
                Point::new(x0, y0 + size),
            ],
        )
    }

    fn label(layer: LayerNum, text: &str, x: i64, y: i64) -> Label {
        Label {
            layer,
            texttype: 25,
            text: ArcStr::from(text),
            origin: Point::new(x, y),
        }
    }

    #[test]
    fn test_pin_named_by_label() {
        let mut cell = Cell::new("macro");
        cell.shapes.push(square(8, 0, 0, 0, 20));
        cell.shapes.push(square(8, 2, 0, 0, 10));
        cell.labels.push(label(8, "vdd", 5, 5));

        let sc = simplify_cell(&cell, &stack(), &test_cfg());
        assert_eq!(sc.pins.len(), 1);
        assert_eq!(sc.pins[0].name, "vdd");
        assert_eq!(sc.pins[0].layer, 8);
        // Clipped to the drawing, which fully covers the marker here.
        assert_eq!(sc.pins[0].poly.bbox(), BoundingBox::new(0, 0, 10, 10));
    }

    #[test]
    fn test_pin_clipped_to_drawing() {
        let mut cell = Cell::new("macro");
        cell.shapes.push(square(8, 0, 0, 0, 6));
        cell.shapes.push(square(8, 2, 0, 0, 10));
        cell.labels.push(label(8, "out", 3, 3));

        let sc = simplify_cell(&cell, &stack(), &test_cfg());
        assert_eq!(sc.pins.len(), 1);
        assert_eq!(sc.pins[0].poly.bbox(), BoundingBox::new(0, 0, 6, 6));
    }

    #[test]
    fn test_ambiguous_labels_take_first() {
        let mut cell = Cell::new("macro");
        cell.shapes.push(square(8, 0, 0, 0, 10));
        cell.shapes.push(square(8, 2, 0, 0, 10));
        cell.labels.push(label(8, "a", 2, 2));
        cell.labels.push(label(8, "b", 8, 8));

        let sc = simplify_cell(&cell, &stack(), &test_cfg());
        assert_eq!(sc.pins.len(), 1);
        assert_eq!(sc.pins[0].name, "a");
    }

    #[test]
    fn test_property_fallback() {
        let mut cell = Cell::new("macro");
        cell.shapes.push(square(8, 0, 0, 0, 10));
        let mut marker = square(8, 2, 0, 0, 10);
        marker.set_property(1, arcstr::literal!("gnd"));
        cell.shapes.push(marker);

        let sc = simplify_cell(&cell, &stack(), &test_cfg());
        assert_eq!(sc.pins.len(), 1);
        assert_eq!(sc.pins[0].name, "gnd");
    }

    #[test]
    fn test_unnamed_pin_dropped() {
        let mut cell = Cell::new("macro");
        cell.shapes.push(square(8, 0, 0, 0, 10));
        cell.shapes.push(square(8, 2, 0, 0, 10));

        let sc = simplify_cell(&cell, &stack(), &test_cfg());
        assert!(sc.pins.is_empty());
    }

    #[test]
    fn test_label_outside_marker_ignored() {
        let mut cell = Cell::new("macro");
        cell.shapes.push(square(8, 0, 0, 0, 10));
        cell.shapes.push(square(8, 2, 0, 0, 10));
        cell.labels.push(label(8, "far", 100, 100));

        let sc = simplify_cell(&cell, &stack(), &test_cfg());
        assert!(sc.pins.is_empty());
    }

    #[test]
    fn test_design_simplifies_each_type_once() {
        let mut lib = Library::new("test");

        let mut io = Cell::new("io_cell");
        io.shapes.push(square(8, 0, 0, 0, 10));
        io.shapes.push(square(8, 2, 0, 0, 10));
        io.labels.push(label(8, "p", 5, 5));
        lib.add_cell(io);

        let mut top = Cell::new("top");
        for i in 0..3 {
            top.insts.push(Instance {
                cell: arcstr::literal!("io_cell"),
                trans: Transform::translate(Point::new(i * 100, 0)),
            });
        }
        lib.add_cell(top);

        let simplified = simplify_design(&lib, "top", &stack(), &test_cfg()).unwrap();
        assert_eq!(simplified.cells.len(), 1);
        assert_eq!(simplified.cells["io_cell"].pins.len(), 1);
    }
}
