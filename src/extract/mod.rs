//! Connectivity extraction session: an arena of polygon records grouped per
//! layer, a pad registry, and the evolving net partition.

use std::collections::HashMap;

use arcstr::ArcStr;

use crate::geom::{BoundingBox, Poly};
use crate::layout::Transform;
use crate::stack::LayerNum;

pub mod collect;
pub mod connect;
pub mod post;
pub mod simplify;

/// Handle of a polygon record in the extraction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PolyId(u32);

/// Handle of a placed top-level instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(u32);

/// Net identifier. Membership lives in the session's net map while
/// extraction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(pub u32);

/// Pad identity: the owning instance (`None` for the top design's own pads)
/// and the pin name. A grouping key, not an ownership relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PadKey {
    pub inst: Option<InstId>,
    pub pin: ArcStr,
}

/// One shape participating in connectivity analysis. Only the net slot is
/// ever mutated after creation.
#[derive(Debug, Clone)]
pub struct Polygon {
    pub layer: LayerNum,
    pub poly: Poly,
    pub bbox: BoundingBox,
    pub pad: Option<PadKey>,
    pub net: Option<NetId>,
}

impl Polygon {
    pub fn new(layer: LayerNum, poly: Poly, pad: Option<PadKey>) -> Self {
        let bbox = poly.bbox();
        Self {
            layer,
            poly,
            bbox,
            pad,
            net: None,
        }
    }
}

/// A placed top-level macro instance.
#[derive(Debug, Clone)]
pub struct RefInfo {
    /// Cell type name.
    pub cell: ArcStr,
    pub trans: Transform,
}

#[derive(Debug, Default)]
pub struct Extractor {
    polys: Vec<Polygon>,
    layers: HashMap<LayerNum, Vec<PolyId>>,
    refs: Vec<RefInfo>,
    pad_keys: Vec<PadKey>,
    pad_index: HashMap<PadKey, usize>,
    pad_members: Vec<Vec<PolyId>>,
    nets: HashMap<NetId, Vec<PolyId>>,
    next_net: u32,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_ref(&mut self, info: RefInfo) -> InstId {
        let id = InstId(self.refs.len() as u32);
        self.refs.push(info);
        id
    }

    pub fn refs(&self) -> &[RefInfo] {
        &self.refs
    }

    /// Placed instances with their handles, in placement order.
    pub fn refs_with_ids(&self) -> impl Iterator<Item = (InstId, &RefInfo)> + '_ {
        self.refs
            .iter()
            .enumerate()
            .map(|(i, r)| (InstId(i as u32), r))
    }

    pub fn ref_info(&self, id: InstId) -> &RefInfo {
        &self.refs[id.0 as usize]
    }

    pub fn add_polygon(&mut self, polygon: Polygon) -> PolyId {
        let id = PolyId(self.polys.len() as u32);
        let layer = polygon.layer;
        if let Some(pad) = polygon.pad.clone() {
            self.pad_entry(pad).push(id);
        }
        self.polys.push(polygon);
        self.layers.entry(layer).or_default().push(id);
        id
    }

    pub fn poly(&self, id: PolyId) -> &Polygon {
        &self.polys[id.0 as usize]
    }

    pub fn polys(&self) -> impl Iterator<Item = (PolyId, &Polygon)> + '_ {
        self.polys
            .iter()
            .enumerate()
            .map(|(i, p)| (PolyId(i as u32), p))
    }

    pub fn layer_ids(&self, layer: LayerNum) -> &[PolyId] {
        self.layers.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sorts a layer population ascending by bbox x0, as the connectivity
    /// sweeps require.
    pub fn sort_layer(&mut self, layer: LayerNum) {
        if let Some(ids) = self.layers.get_mut(&layer) {
            ids.sort_by_key(|id| self.polys[id.0 as usize].bbox.x0);
        }
    }

    fn pad_entry(&mut self, key: PadKey) -> &mut Vec<PolyId> {
        let idx = match self.pad_index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.pad_keys.len();
                self.pad_keys.push(key.clone());
                self.pad_index.insert(key, i);
                self.pad_members.push(Vec::new());
                i
            }
        };
        &mut self.pad_members[idx]
    }

    /// Creates an empty entry for an expected pad that never appeared, so
    /// downstream consumers still see it.
    pub fn seed_pad(&mut self, key: PadKey) {
        self.pad_entry(key);
    }

    /// Pad identities with their member polygons, in first-seen order.
    pub fn pads(&self) -> impl Iterator<Item = (&PadKey, &[PolyId])> + '_ {
        self.pad_keys
            .iter()
            .zip(self.pad_members.iter().map(Vec::as_slice))
    }

    pub fn pad_members(&self, key: &PadKey) -> Option<&[PolyId]> {
        self.pad_index
            .get(key)
            .map(|&i| self.pad_members[i].as_slice())
    }

    /// The net of a pad, taken from its first member polygon.
    pub fn pad_net(&self, key: &PadKey) -> Option<NetId> {
        self.pad_members(key)?
            .first()
            .and_then(|&id| self.poly(id).net)
    }

    pub fn alloc_net(&mut self) -> NetId {
        let id = NetId(self.next_net);
        self.next_net += 1;
        id
    }

    /// Puts an unassigned polygon on a fresh singleton net.
    pub fn assign_new_net(&mut self, id: PolyId) -> NetId {
        debug_assert!(self.polys[id.0 as usize].net.is_none());
        let net = self.alloc_net();
        self.polys[id.0 as usize].net = Some(net);
        self.nets.insert(net, vec![id]);
        net
    }

    /// Adds an unassigned polygon to a net.
    pub fn adopt(&mut self, id: PolyId, net: NetId) {
        debug_assert!(self.polys[id.0 as usize].net.is_none());
        self.polys[id.0 as usize].net = Some(net);
        self.nets.entry(net).or_default().push(id);
    }

    /// The polygon's net, assigning a fresh singleton net first if needed.
    pub fn ensure_net(&mut self, id: PolyId) -> NetId {
        match self.polys[id.0 as usize].net {
            Some(net) => net,
            None => self.assign_new_net(id),
        }
    }

    /// Union-by-size merge: relinks the smaller net's members onto the
    /// larger and deletes the emptied bucket. Returns the surviving id.
    pub fn merge_nets(&mut self, n1: NetId, n2: NetId) -> NetId {
        if n1 == n2 {
            return n1;
        }
        let len1 = self.nets.get(&n1).map_or(0, Vec::len);
        let len2 = self.nets.get(&n2).map_or(0, Vec::len);
        let (old, new) = if len1 > len2 { (n2, n1) } else { (n1, n2) };

        let members = self.nets.remove(&old).unwrap_or_default();
        for &id in &members {
            self.polys[id.0 as usize].net = Some(new);
        }
        self.nets.entry(new).or_default().extend(members);
        new
    }

    /// Assigns fresh singleton nets to any polygon left without one (a via
    /// touching no metal), so every polygon ends extraction assigned.
    pub fn assign_stragglers(&mut self) -> usize {
        let mut assigned = 0;
        for i in 0..self.polys.len() {
            if self.polys[i].net.is_none() {
                self.assign_new_net(PolyId(i as u32));
                assigned += 1;
            }
        }
        assigned
    }

    pub fn nets(&self) -> &HashMap<NetId, Vec<PolyId>> {
        &self.nets
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn poly_count(&self) -> usize {
        self.polys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{BoundingBox, Poly};

    fn rect_polygon(layer: LayerNum, x0: i64, y0: i64, x1: i64, y1: i64) -> Polygon {
        Polygon::new(layer, Poly::from_rect(BoundingBox::new(x0, y0, x1, y1)), None)
    }

    #[test]
    fn test_merge_by_size() {
        let mut ex = Extractor::new();
        let a = ex.add_polygon(rect_polygon(8, 0, 0, 10, 10));
        let b = ex.add_polygon(rect_polygon(8, 5, 0, 15, 10));
        let c = ex.add_polygon(rect_polygon(8, 100, 0, 110, 10));

        let n1 = ex.assign_new_net(a);
        ex.adopt(b, n1);
        let n2 = ex.assign_new_net(c);

        let before = ex.net_count();
        let survivor = ex.merge_nets(n1, n2);
        // The larger net survives and the count drops by exactly one.
        assert_eq!(survivor, n1);
        assert_eq!(ex.net_count(), before - 1);
        assert_eq!(ex.poly(c).net, Some(n1));
        assert!(!ex.nets().contains_key(&n2));
    }

    #[test]
    fn test_merge_preserves_geometry_and_identity() {
        let mut ex = Extractor::new();
        let key = PadKey {
            inst: None,
            pin: arcstr::literal!("p0"),
        };
        let a = ex.add_polygon(Polygon::new(
            8,
            Poly::from_rect(BoundingBox::new(0, 0, 10, 10)),
            Some(key.clone()),
        ));
        let b = ex.add_polygon(rect_polygon(8, 20, 0, 30, 10));
        let n1 = ex.assign_new_net(a);
        let n2 = ex.assign_new_net(b);

        let bbox_before = ex.poly(a).bbox;
        ex.merge_nets(n1, n2);
        assert_eq!(ex.poly(a).bbox, bbox_before);
        assert_eq!(ex.poly(a).pad.as_ref(), Some(&key));
    }

    #[test]
    fn test_pads_keep_first_seen_order() {
        let mut ex = Extractor::new();
        let k1 = PadKey {
            inst: None,
            pin: arcstr::literal!("b"),
        };
        let k2 = PadKey {
            inst: None,
            pin: arcstr::literal!("a"),
        };
        ex.add_polygon(Polygon::new(
            8,
            Poly::from_rect(BoundingBox::new(0, 0, 1, 1)),
            Some(k1.clone()),
        ));
        ex.add_polygon(Polygon::new(
            8,
            Poly::from_rect(BoundingBox::new(2, 0, 3, 1)),
            Some(k2.clone()),
        ));
        let keys: Vec<_> = ex.pads().map(|(k, _)| k.pin.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_stragglers_get_nets() {
        let mut ex = Extractor::new();
        let a = ex.add_polygon(rect_polygon(19, 0, 0, 2, 2));
        assert_eq!(ex.assign_stragglers(), 1);
        assert!(ex.poly(a).net.is_some());
    }
}
