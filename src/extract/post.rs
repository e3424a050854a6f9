//! Post-processing: targeted implicit-connection overrides for library cells
//! whose split pads are equivalent by construction, and the completeness
//! check over every pad identity.

use std::fmt;

use arcstr::ArcStr;
use regex::Regex;

use crate::geom::Point;

use super::{Extractor, NetId, PadKey, PolyId};

/// Force-merges the nets of every multi-shape pad whose owning instance's
/// cell type matches `pattern`, regardless of drawn adjacency. Must run
/// before [`check_multi_pads`]. Returns the number of merges performed.
pub fn implicit_pin_connect(ex: &mut Extractor, pattern: &Regex) -> usize {
    let candidates: Vec<Vec<PolyId>> = ex
        .pads()
        .filter(|(key, members)| {
            members.len() > 1
                && key
                    .inst
                    .is_some_and(|inst| pattern.is_match(ex.ref_info(inst).cell.as_str()))
        })
        .map(|(_, members)| members.to_vec())
        .collect();

    let mut merges = 0;
    for members in candidates {
        loop {
            let mut nets: Vec<NetId> = members.iter().filter_map(|&id| ex.poly(id).net).collect();
            nets.sort_unstable();
            nets.dedup();
            if nets.len() < 2 {
                break;
            }
            ex.merge_nets(nets[0], nets[1]);
            merges += 1;
        }
    }
    merges
}

/// A pad identity whose member shapes ended on more than one net.
#[derive(Debug, Clone)]
pub struct PadViolation {
    pub pin: ArcStr,
    /// Owning cell type; `None` for the top design's own pads.
    pub cell: Option<ArcStr>,
    /// Origin of the owning instance.
    pub origin: Option<Point>,
    pub nets: Vec<NetId>,
}

impl fmt::Display for PadViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.cell, &self.origin) {
            (Some(cell), Some(origin)) => write!(
                f,
                "pad `{}` on cell `{}` at {} not fully connected ({} nets)",
                self.pin,
                cell,
                origin,
                self.nets.len()
            ),
            _ => write!(
                f,
                "top-level pad `{}` not fully connected ({} nets)",
                self.pin,
                self.nets.len()
            ),
        }
    }
}

/// Verifies that every pad identity's members share a single net. All
/// violations are collected; the first problem never hides the rest.
/// Entries with no members (seeded expected pads) are skipped.
pub fn check_multi_pads(ex: &Extractor) -> Vec<PadViolation> {
    let mut violations = Vec::new();

    for (key, members) in ex.pads() {
        if members.is_empty() {
            continue;
        }
        let mut nets: Vec<NetId> = members.iter().filter_map(|&id| ex.poly(id).net).collect();
        nets.sort_unstable();
        nets.dedup();
        if nets.len() == 1 {
            continue;
        }
        violations.push(violation_for(ex, key, nets));
    }

    violations
}

fn violation_for(ex: &Extractor, key: &PadKey, nets: Vec<NetId>) -> PadViolation {
    let (cell, origin) = match key.inst {
        Some(inst) => {
            let info = ex.ref_info(inst);
            (Some(info.cell.clone()), Some(info.trans.origin))
        }
        None => (None, None),
    };
    PadViolation {
        pin: key.pin.clone(),
        cell,
        origin,
        nets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::connect::connect_layer;
    use crate::extract::{InstId, Polygon, RefInfo};
    use crate::geom::{BoundingBox, Poly};
    use crate::layout::Transform;

    /// Two disjoint pad shapes of a corner cell, plus one connected pad of
    /// another instance. Mirrors a segmented ring cell whose halves only
    /// meet inside the macro.
    fn corner_session() -> (Extractor, InstId) {
        let mut ex = Extractor::new();
        let corner = ex.add_ref(RefInfo {
            cell: arcstr::literal!("sg13g2_Corner_pad"),
            trans: Transform::default(),
        });
        let key = PadKey {
            inst: Some(corner),
            pin: arcstr::literal!("IOPAD_GND"),
        };
        ex.add_polygon(Polygon::new(
            8,
            Poly::from_rect(BoundingBox::new(0, 0, 10, 10)),
            Some(key.clone()),
        ));
        ex.add_polygon(Polygon::new(
            8,
            Poly::from_rect(BoundingBox::new(100, 0, 110, 10)),
            Some(key),
        ));
        ex.sort_layer(8);
        connect_layer(&mut ex, 8);
        (ex, corner)
    }

    #[test]
    fn test_split_pad_fails_then_implicit_connect_heals() {
        let (mut ex, _) = corner_session();

        let violations = check_multi_pads(&ex);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].pin, "IOPAD_GND");
        assert_eq!(violations[0].cell.as_deref(), Some("sg13g2_Corner_pad"));

        let pattern = Regex::new("^sg13g2_Corner.*").unwrap();
        let merges = implicit_pin_connect(&mut ex, &pattern);
        assert_eq!(merges, 1);
        assert!(check_multi_pads(&ex).is_empty());
    }

    #[test]
    fn test_pattern_must_match_cell_type() {
        let (mut ex, _) = corner_session();
        let pattern = Regex::new("^sg13g2_IO.*").unwrap();
        assert_eq!(implicit_pin_connect(&mut ex, &pattern), 0);
        assert_eq!(check_multi_pads(&ex).len(), 1);
    }

    #[test]
    fn test_top_level_pads_never_implicitly_connected() {
        let mut ex = Extractor::new();
        let key = PadKey {
            inst: None,
            pin: arcstr::literal!("pad_raw[0]"),
        };
        ex.add_polygon(Polygon::new(
            8,
            Poly::from_rect(BoundingBox::new(0, 0, 10, 10)),
            Some(key.clone()),
        ));
        ex.add_polygon(Polygon::new(
            8,
            Poly::from_rect(BoundingBox::new(50, 0, 60, 10)),
            Some(key),
        ));
        ex.sort_layer(8);
        connect_layer(&mut ex, 8);

        let pattern = Regex::new(".*").unwrap();
        assert_eq!(implicit_pin_connect(&mut ex, &pattern), 0);

        let violations = check_multi_pads(&ex);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].cell.is_none());
    }

    #[test]
    fn test_all_violations_reported() {
        let mut ex = Extractor::new();
        for (i, pin) in ["a", "b"].iter().enumerate() {
            let inst = ex.add_ref(RefInfo {
                cell: arcstr::literal!("macro"),
                trans: Transform::default(),
            });
            let key = PadKey {
                inst: Some(inst),
                pin: ArcStr::from(*pin),
            };
            let off = i as i64 * 1000;
            ex.add_polygon(Polygon::new(
                8,
                Poly::from_rect(BoundingBox::new(off, 0, off + 10, 10)),
                Some(key.clone()),
            ));
            ex.add_polygon(Polygon::new(
                8,
                Poly::from_rect(BoundingBox::new(off + 100, 0, off + 110, 10)),
                Some(key),
            ));
        }
        ex.sort_layer(8);
        connect_layer(&mut ex, 8);

        assert_eq!(check_multi_pads(&ex).len(), 2);
    }

    #[test]
    fn test_seeded_pads_ignored_by_check() {
        let mut ex = Extractor::new();
        ex.seed_pad(PadKey {
            inst: None,
            pin: arcstr::literal!("pad_raw[7]"),
        });
        assert!(check_multi_pads(&ex).is_empty());
    }
}
