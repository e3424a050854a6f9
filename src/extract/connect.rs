//! Net construction: a same-layer sweep over x0-sorted populations, then a
//! via sweep bridging each adjacent metal pair.

use log::info;

use crate::stack::{LayerNum, LayerStack};

use super::{Extractor, PolyId};

/// Same-layer pass. The population must be sorted ascending by bbox x0:
/// once a candidate starts past the current polygon's right edge, nothing
/// later can touch it and the scan stops.
///
/// Returns the number of net merges performed; a pass over an already
/// connected population performs none.
pub fn connect_layer(ex: &mut Extractor, layer: LayerNum) -> usize {
    let ids: Vec<PolyId> = ex.layer_ids(layer).to_vec();
    let mut merges = 0;

    for i in 0..ids.len() {
        let pi = ids[i];
        ex.ensure_net(pi);

        for &pj in &ids[i + 1..] {
            if ex.poly(pj).bbox.x0 > ex.poly(pi).bbox.x1 {
                break;
            }
            // Reread on every candidate: a merge may have relinked pi.
            let ni = ex.poly(pi).net.expect("assigned above");
            let nj = ex.poly(pj).net;
            if nj == Some(ni) {
                continue;
            }
            if !ex.poly(pi).poly.overlaps(&ex.poly(pj).poly) {
                continue;
            }
            match nj {
                None => ex.adopt(pj, ni),
                Some(nj) => {
                    ex.merge_nets(ni, nj);
                    merges += 1;
                }
            }
        }
    }

    merges
}

/// Via pass between one metal layer and one via layer, both sorted by x0.
/// A lower index into the via list advances past vias whose x-extent falls
/// fully below the current metal polygon; since metals only move right, such
/// vias can never match again.
pub fn connect_vias(ex: &mut Extractor, metal: LayerNum, via: LayerNum) -> usize {
    let mids: Vec<PolyId> = ex.layer_ids(metal).to_vec();
    let vids: Vec<PolyId> = ex.layer_ids(via).to_vec();
    let mut merges = 0;
    let mut v_start = 0usize;

    for &pm in &mids {
        let m_bbox = ex.poly(pm).bbox;

        let mut j = v_start;
        while j < vids.len() {
            let pv = vids[j];
            let v_bbox = ex.poly(pv).bbox;

            if v_bbox.x1 < m_bbox.x0 {
                if j == v_start {
                    v_start = j + 1;
                }
                j += 1;
                continue;
            }
            if v_bbox.x0 > m_bbox.x1 {
                break;
            }

            let nm = ex.poly(pm).net;
            let nv = ex.poly(pv).net;
            if nv.is_some() && nv == nm {
                j += 1;
                continue;
            }
            if !ex.poly(pm).poly.overlaps(&ex.poly(pv).poly) {
                j += 1;
                continue;
            }

            let nm = ex.ensure_net(pm);
            match nv {
                None => ex.adopt(pv, nm),
                Some(nv) => {
                    ex.merge_nets(nm, nv);
                    merges += 1;
                }
            }
            j += 1;
        }
    }

    merges
}

/// Runs the full connectivity schedule: every metal layer, then every
/// (metal, via, metal) step of the stack, then singleton nets for anything
/// still unassigned.
pub fn connect_all(ex: &mut Extractor, stack: &LayerStack) {
    for &layer in stack.metals() {
        let population = ex.layer_ids(layer).len();
        let merges = connect_layer(ex, layer);
        let nets = distinct_layer_nets(ex, layer);
        info!("layer {layer:3}: {population:5} polygons -> {nets:5} nets ({merges} merges)");
    }

    for t in stack.triples() {
        info!("via pass {:3} -- {:3} -- {:3}", t.bottom, t.via, t.top);
        connect_vias(ex, t.bottom, t.via);
        connect_vias(ex, t.top, t.via);
    }

    let stragglers = ex.assign_stragglers();
    if stragglers > 0 {
        info!("{stragglers} isolated shapes kept singleton nets");
    }
}

fn distinct_layer_nets(ex: &Extractor, layer: LayerNum) -> usize {
    let mut nets: Vec<_> = ex
        .layer_ids(layer)
        .iter()
        .filter_map(|&id| ex.poly(id).net)
        .collect();
    nets.sort_unstable();
    nets.dedup();
    nets.len()
}
