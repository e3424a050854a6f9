//! In-memory layout model: cells of polygons, labels and placed instances,
//! with the flattening operations the extractor needs. GDSII conversion
//! lives in [`gds`].

use std::collections::{HashMap, HashSet};

use arcstr::ArcStr;
use thiserror::Error;

use crate::geom::Point;
use crate::stack::LayerNum;

pub mod gds;

pub type DataType = i16;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("cell `{0}` not found")]
    UnknownCell(String),
    #[error("library has no cells")]
    EmptyLibrary,
    #[error("no unambiguous top cell, candidates: {0:?}")]
    AmbiguousTop(Vec<String>),
}

/// GDS SREF placement: reflect about the x axis, magnify, rotate, translate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub origin: Point,
    pub reflect: bool,
    /// Counter-clockwise rotation in degrees.
    pub angle: f64,
    pub mag: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            origin: Point::new(0, 0),
            reflect: false,
            angle: 0.0,
            mag: 1.0,
        }
    }
}

impl Transform {
    pub fn translate(origin: Point) -> Self {
        Self {
            origin,
            ..Self::default()
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        let (mut x, mut y) = (p.x, p.y);
        if self.reflect {
            y = -y;
        }
        if self.mag != 1.0 {
            x = (x as f64 * self.mag).round() as i64;
            y = (y as f64 * self.mag).round() as i64;
        }
        let (x, y) = match self.angle.rem_euclid(360.0) {
            a if a == 0.0 => (x, y),
            a if a == 90.0 => (-y, x),
            a if a == 180.0 => (-x, -y),
            a if a == 270.0 => (y, -x),
            a => {
                let (sin, cos) = a.to_radians().sin_cos();
                (
                    (x as f64 * cos - y as f64 * sin).round() as i64,
                    (x as f64 * sin + y as f64 * cos).round() as i64,
                )
            }
        };
        Point::new(x + self.origin.x, y + self.origin.y)
    }
}

/// One drawn polygon: outline points on a (layer, datatype) pair, plus any
/// GDS string properties attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub layer: LayerNum,
    pub datatype: DataType,
    pub points: Vec<Point>,
    pub properties: Vec<(i16, ArcStr)>,
}

impl Shape {
    pub fn new(layer: LayerNum, datatype: DataType, points: Vec<Point>) -> Self {
        Self {
            layer,
            datatype,
            points,
            properties: Vec::new(),
        }
    }

    pub fn property(&self, attr: i16) -> Option<&ArcStr> {
        self.properties
            .iter()
            .find(|(a, _)| *a == attr)
            .map(|(_, v)| v)
    }

    pub fn set_property(&mut self, attr: i16, value: ArcStr) {
        if let Some(slot) = self.properties.iter_mut().find(|(a, _)| *a == attr) {
            slot.1 = value;
        } else {
            self.properties.push((attr, value));
        }
    }

    fn transformed(&self, t: &Transform) -> Self {
        Self {
            layer: self.layer,
            datatype: self.datatype,
            points: self.points.iter().map(|&p| t.apply(p)).collect(),
            properties: self.properties.clone(),
        }
    }
}

/// A text label, used to name pin markers.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub layer: LayerNum,
    pub texttype: DataType,
    pub text: ArcStr,
    pub origin: Point,
}

impl Label {
    fn transformed(&self, t: &Transform) -> Self {
        Self {
            layer: self.layer,
            texttype: self.texttype,
            text: self.text.clone(),
            origin: t.apply(self.origin),
        }
    }
}

/// A placed reference to another cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub cell: ArcStr,
    pub trans: Transform,
}

#[derive(Debug, Clone, Default)]
pub struct Cell {
    pub name: ArcStr,
    pub shapes: Vec<Shape>,
    pub labels: Vec<Label>,
    pub insts: Vec<Instance>,
}

impl Cell {
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn shapes_on(
        &self,
        layer: LayerNum,
        datatype: DataType,
    ) -> impl Iterator<Item = &Shape> + '_ {
        self.shapes
            .iter()
            .filter(move |s| s.layer == layer && s.datatype == datatype)
    }

    pub fn labels_on(
        &self,
        layer: LayerNum,
        texttype: DataType,
    ) -> impl Iterator<Item = &Label> + '_ {
        self.labels
            .iter()
            .filter(move |l| l.layer == layer && l.texttype == texttype)
    }
}

/// A named collection of cells. Cell order is preserved; lookups go through
/// a name index.
#[derive(Debug, Clone)]
pub struct Library {
    pub name: ArcStr,
    cells: Vec<Cell>,
    index: HashMap<ArcStr, usize>,
}

impl Library {
    pub fn new(name: impl Into<ArcStr>) -> Self {
        Self {
            name: name.into(),
            cells: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn add_cell(&mut self, cell: Cell) {
        match self.index.get(&cell.name) {
            Some(&i) => self.cells[i] = cell,
            None => {
                self.index.insert(cell.name.clone(), self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.cells.iter()
    }

    pub fn cell(&self, name: &str) -> Option<&Cell> {
        self.index.get(name).map(|&i| &self.cells[i])
    }

    pub fn cell_mut(&mut self, name: &str) -> Option<&mut Cell> {
        self.index.get(name).map(|&i| &mut self.cells[i])
    }

    /// The unique cell not placed by any other cell.
    pub fn top_cell(&self) -> Result<&Cell, LayoutError> {
        if self.cells.is_empty() {
            return Err(LayoutError::EmptyLibrary);
        }
        let referenced: HashSet<&str> = self
            .cells
            .iter()
            .flat_map(|c| c.insts.iter().map(|i| i.cell.as_str()))
            .collect();
        let tops: Vec<&Cell> = self
            .cells
            .iter()
            .filter(|c| !referenced.contains(c.name.as_str()))
            .collect();
        match tops.as_slice() {
            [top] => Ok(top),
            _ => Err(LayoutError::AmbiguousTop(
                tops.iter().map(|c| c.name.to_string()).collect(),
            )),
        }
    }

    /// Appends the planar geometry of `name` under `trans` to the output
    /// buffers, recursing through sub-instances.
    pub fn flatten_cell(
        &self,
        name: &str,
        trans: &Transform,
        out_shapes: &mut Vec<Shape>,
        out_labels: &mut Vec<Label>,
    ) -> Result<(), LayoutError> {
        let cell = self
            .cell(name)
            .ok_or_else(|| LayoutError::UnknownCell(name.to_string()))?;
        for s in &cell.shapes {
            out_shapes.push(s.transformed(trans));
        }
        for l in &cell.labels {
            out_labels.push(l.transformed(trans));
        }
        for inst in &cell.insts {
            let mut sub_shapes = Vec::new();
            let mut sub_labels = Vec::new();
            self.flatten_cell(&inst.cell, &inst.trans, &mut sub_shapes, &mut sub_labels)?;
            for s in sub_shapes {
                out_shapes.push(s.transformed(trans));
            }
            for l in sub_labels {
                out_labels.push(l.transformed(trans));
            }
        }
        Ok(())
    }

    /// Flattens instances of `host` whose target cell name satisfies
    /// `matches` into the host's own geometry; other instances are left in
    /// place.
    pub fn flatten_instances(
        &mut self,
        host: &str,
        matches: impl Fn(&str) -> bool,
    ) -> Result<(), LayoutError> {
        let idx = *self
            .index
            .get(host)
            .ok_or_else(|| LayoutError::UnknownCell(host.to_string()))?;

        let mut flattened = Vec::new();
        let mut kept = Vec::new();
        for inst in std::mem::take(&mut self.cells[idx].insts) {
            if matches(&inst.cell) {
                flattened.push(inst);
            } else {
                kept.push(inst);
            }
        }
        self.cells[idx].insts = kept;

        let mut shapes = Vec::new();
        let mut labels = Vec::new();
        for inst in &flattened {
            self.flatten_cell(&inst.cell, &inst.trans, &mut shapes, &mut labels)?;
        }

        let cell = &mut self.cells[idx];
        cell.shapes.extend(shapes);
        cell.labels.extend(labels);
        Ok(())
    }

    /// Fully flattens `cell` in place, then copies every drawing shape on
    /// `layer` to the pin datatype carrying `pin` as its name property. Used
    /// for pad cells that carry no drawn pin markers of their own.
    pub fn promote_pins(
        &mut self,
        cell: &str,
        layer: LayerNum,
        pin: &ArcStr,
        drawing_dt: DataType,
        pin_dt: DataType,
        name_attr: i16,
    ) -> Result<(), LayoutError> {
        self.flatten_instances(cell, |_| true)?;

        let cell = self.cell_mut(cell).expect("checked by flatten_instances");
        let mut promoted = Vec::new();
        for s in &mut cell.shapes {
            if s.layer == layer && s.datatype == drawing_dt {
                s.set_property(name_attr, pin.clone());
                let mut copy = s.clone();
                copy.datatype = pin_dt;
                promoted.push(copy);
            }
        }
        cell.shapes.extend(promoted);
        Ok(())
    }
}
