use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A GDS layer number.
pub type LayerNum = i16;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("layer stack has no triples")]
    Empty,
    #[error("stack discontinuity: triple {0} ends on metal {1} but triple {2} starts on metal {3}")]
    Discontinuity(usize, LayerNum, usize, LayerNum),
}

/// One (bottom metal, via, top metal) step of the process stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackTriple {
    pub bottom: LayerNum,
    pub via: LayerNum,
    pub top: LayerNum,
}

/// The ordered metal/via layer sequence of the process, bottom to top.
/// Consecutive triples must chain: each one's top metal is the next one's
/// bottom metal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerStack {
    metals: Vec<LayerNum>,
    vias: Vec<LayerNum>,
}

impl LayerStack {
    pub fn from_triples(triples: &[StackTriple]) -> Result<Self, StackError> {
        let first = triples.first().ok_or(StackError::Empty)?;
        let mut metals = vec![first.bottom];
        let mut vias = Vec::with_capacity(triples.len());

        for (i, t) in triples.iter().enumerate() {
            let prev = *metals.last().unwrap();
            if t.bottom != prev {
                return Err(StackError::Discontinuity(i.saturating_sub(1), prev, i, t.bottom));
            }
            vias.push(t.via);
            metals.push(t.top);
        }

        Ok(Self { metals, vias })
    }

    /// Metal layers, bottom to top.
    pub fn metals(&self) -> &[LayerNum] {
        &self.metals
    }

    /// Via layers, bottom to top.
    pub fn vias(&self) -> &[LayerNum] {
        &self.vias
    }

    /// (bottom metal, via, top metal) adjacency steps in stack order.
    pub fn triples(&self) -> impl Iterator<Item = StackTriple> + '_ {
        self.vias.iter().enumerate().map(|(i, &via)| StackTriple {
            bottom: self.metals[i],
            via,
            top: self.metals[i + 1],
        })
    }
}

lazy_static! {
    /// The IHP sg13g2 metal/via stack, Metal1 up to TopMetal2.
    pub static ref SG13G2: LayerStack = LayerStack::from_triples(&[
        StackTriple { bottom: 8, via: 19, top: 10 },    // Metal1 / Via1 / Metal2
        StackTriple { bottom: 10, via: 29, top: 30 },   // Metal2 / Via2 / Metal3
        StackTriple { bottom: 30, via: 49, top: 50 },   // Metal3 / Via3 / Metal4
        StackTriple { bottom: 50, via: 66, top: 67 },   // Metal4 / Via4 / Metal5
        StackTriple { bottom: 67, via: 125, top: 126 }, // Metal5 / TopVia1 / TopMetal1
        StackTriple { bottom: 126, via: 133, top: 134 }, // TopMetal1 / TopVia2 / TopMetal2
    ])
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sg13g2_shape() {
        assert_eq!(SG13G2.metals(), &[8, 10, 30, 50, 67, 126, 134]);
        assert_eq!(SG13G2.vias(), &[19, 29, 49, 66, 125, 133]);
        assert_eq!(SG13G2.triples().count(), 6);
    }

    #[test]
    fn test_discontinuity_rejected() {
        let triples = [
            StackTriple { bottom: 1, via: 2, top: 3 },
            StackTriple { bottom: 4, via: 5, top: 6 },
        ];
        assert!(LayerStack::from_triples(&triples).is_err());
    }

    #[test]
    fn test_empty_rejected() {
        assert!(matches!(LayerStack::from_triples(&[]), Err(StackError::Empty)));
    }
}
