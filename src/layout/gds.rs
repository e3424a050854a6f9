//! GDSII import/export for the layout model, backed by gds21.

use std::path::Path;

use arcstr::ArcStr;
use gds21::{
    GdsArrayRef, GdsBoundary, GdsElement, GdsLibrary, GdsPoint, GdsProperty, GdsStrans,
    GdsStruct, GdsStructRef, GdsTextElem,
};
use log::warn;
use thiserror::Error;

use crate::geom::Point;
use crate::layout::{Cell, Instance, Label, Library, Shape, Transform};

#[derive(Debug, Error)]
pub enum GdsError {
    #[error("failed to read GDS `{path}`: {message}")]
    Read { path: String, message: String },
    #[error("failed to write GDS `{path}`: {message}")]
    Write { path: String, message: String },
}

pub fn read_gds(path: impl AsRef<Path>) -> Result<Library, GdsError> {
    let path = path.as_ref();
    let gds = GdsLibrary::load(path).map_err(|e| GdsError::Read {
        path: path.display().to_string(),
        message: format!("{e:?}"),
    })?;
    Ok(import_library(&gds))
}

pub fn write_gds(lib: &Library, path: impl AsRef<Path>) -> Result<(), GdsError> {
    let path = path.as_ref();
    export_library(lib).save(path).map_err(|e| GdsError::Write {
        path: path.display().to_string(),
        message: format!("{e:?}"),
    })
}

fn import_library(gds: &GdsLibrary) -> Library {
    let mut lib = Library::new(gds.name.as_str());
    let mut skipped = 0usize;
    for s in &gds.structs {
        lib.add_cell(import_cell(s, &mut skipped));
    }
    if skipped > 0 {
        warn!("skipped {skipped} unsupported GDS elements (paths, nodes, boxes)");
    }
    lib
}

fn import_cell(s: &GdsStruct, skipped: &mut usize) -> Cell {
    let mut cell = Cell::new(s.name.as_str());
    for elem in &s.elems {
        match elem {
            GdsElement::GdsBoundary(b) => cell.shapes.push(import_boundary(b)),
            GdsElement::GdsTextElem(t) => cell.labels.push(import_text(t)),
            GdsElement::GdsStructRef(r) => cell.insts.push(import_sref(r)),
            GdsElement::GdsArrayRef(a) => cell.insts.extend(import_aref(a)),
            _ => *skipped += 1,
        }
    }
    cell
}

fn import_boundary(b: &GdsBoundary) -> Shape {
    let mut points: Vec<Point> = b
        .xy
        .iter()
        .map(|p| Point::new(p.x as i64, p.y as i64))
        .collect();
    // GDS repeats the first point to close the outline.
    if points.len() >= 2 && points.first() == points.last() {
        points.pop();
    }
    let mut shape = Shape::new(b.layer, b.datatype, points);
    shape.properties = b
        .properties
        .iter()
        .map(|p| (p.attr, ArcStr::from(p.value.as_str())))
        .collect();
    shape
}

fn import_text(t: &GdsTextElem) -> Label {
    Label {
        layer: t.layer,
        texttype: t.texttype,
        text: ArcStr::from(t.string.as_str()),
        origin: Point::new(t.xy.x as i64, t.xy.y as i64),
    }
}

fn import_strans(strans: &Option<GdsStrans>, origin: Point) -> Transform {
    let mut t = Transform {
        origin,
        ..Transform::default()
    };
    if let Some(s) = strans {
        t.reflect = s.reflected;
        t.angle = s.angle.unwrap_or(0.0);
        t.mag = s.mag.unwrap_or(1.0);
    }
    t
}

fn import_sref(r: &GdsStructRef) -> Instance {
    Instance {
        cell: ArcStr::from(r.name.as_str()),
        trans: import_strans(&r.strans, Point::new(r.xy.x as i64, r.xy.y as i64)),
    }
}

/// Expands an AREF into one placement per array site.
fn import_aref(a: &GdsArrayRef) -> Vec<Instance> {
    let origin = Point::new(a.xy[0].x as i64, a.xy[0].y as i64);
    let cols = a.cols.max(1) as i64;
    let rows = a.rows.max(1) as i64;
    let col_step = (
        (a.xy[1].x as i64 - origin.x) / cols,
        (a.xy[1].y as i64 - origin.y) / cols,
    );
    let row_step = (
        (a.xy[2].x as i64 - origin.x) / rows,
        (a.xy[2].y as i64 - origin.y) / rows,
    );

    let mut insts = Vec::with_capacity((cols * rows) as usize);
    for r in 0..rows {
        for c in 0..cols {
            let site = Point::new(
                origin.x + c * col_step.0 + r * row_step.0,
                origin.y + c * col_step.1 + r * row_step.1,
            );
            insts.push(Instance {
                cell: ArcStr::from(a.name.as_str()),
                trans: import_strans(&a.strans, site),
            });
        }
    }
    insts
}

fn export_library(lib: &Library) -> GdsLibrary {
    // gds21's library defaults carry standard 1nm database units.
    let mut gds = GdsLibrary::new(lib.name.as_str());
    for cell in lib.cells() {
        gds.structs.push(export_cell(cell));
    }
    gds
}

fn export_cell(cell: &Cell) -> GdsStruct {
    let mut s = GdsStruct::new(cell.name.as_str());
    for shape in &cell.shapes {
        s.elems.push(export_shape(shape));
    }
    for label in &cell.labels {
        s.elems.push(
            GdsTextElem {
                string: label.text.to_string(),
                layer: label.layer,
                texttype: label.texttype,
                xy: GdsPoint::new(label.origin.x as i32, label.origin.y as i32),
                ..Default::default()
            }
            .into(),
        );
    }
    for inst in &cell.insts {
        s.elems.push(export_instance(inst));
    }
    s
}

fn export_shape(shape: &Shape) -> GdsElement {
    let mut xy: Vec<GdsPoint> = shape
        .points
        .iter()
        .map(|p| GdsPoint::new(p.x as i32, p.y as i32))
        .collect();
    if let Some(first) = xy.first().cloned() {
        xy.push(first);
    }
    GdsBoundary {
        layer: shape.layer,
        datatype: shape.datatype,
        xy,
        properties: shape
            .properties
            .iter()
            .map(|(attr, value)| GdsProperty {
                attr: *attr,
                value: value.to_string(),
            })
            .collect(),
        ..Default::default()
    }
    .into()
}

fn export_instance(inst: &Instance) -> GdsElement {
    let t = &inst.trans;
    let strans = if t.reflect || t.angle != 0.0 || t.mag != 1.0 {
        Some(GdsStrans {
            reflected: t.reflect,
            angle: (t.angle != 0.0).then_some(t.angle),
            mag: (t.mag != 1.0).then_some(t.mag),
            ..Default::default()
        })
    } else {
        None
    };
    GdsStructRef {
        name: inst.cell.to_string(),
        xy: GdsPoint::new(t.origin.x as i32, t.origin.y as i32),
        strans,
        ..Default::default()
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut lib = Library::new("rt");

        let mut leaf = Cell::new("leaf");
        let mut shape = Shape::new(
            8,
            0,
            vec![
                Point::new(0, 0),
                Point::new(10, 0),
                Point::new(10, 10),
                Point::new(0, 10),
            ],
        );
        shape.set_property(1, arcstr::literal!("vdd"));
        leaf.shapes.push(shape);
        leaf.labels.push(Label {
            layer: 8,
            texttype: 25,
            text: arcstr::literal!("vdd"),
            origin: Point::new(5, 5),
        });
        lib.add_cell(leaf);

        let mut top = Cell::new("top");
        top.insts.push(Instance {
            cell: arcstr::literal!("leaf"),
            trans: Transform {
                origin: Point::new(100, 200),
                reflect: true,
                angle: 90.0,
                mag: 1.0,
            },
        });
        lib.add_cell(top);

        let back = import_library(&export_library(&lib));

        let leaf = back.cell("leaf").unwrap();
        assert_eq!(leaf.shapes.len(), 1);
        assert_eq!(leaf.shapes[0].points.len(), 4);
        assert_eq!(leaf.shapes[0].property(1), Some(&arcstr::literal!("vdd")));
        assert_eq!(leaf.labels.len(), 1);
        assert_eq!(leaf.labels[0].origin, Point::new(5, 5));

        let top = back.cell("top").unwrap();
        assert_eq!(top.insts.len(), 1);
        let t = &top.insts[0].trans;
        assert_eq!(t.origin, Point::new(100, 200));
        assert!(t.reflect);
        assert_eq!(t.angle, 90.0);
    }
}
