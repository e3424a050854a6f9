use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::stack::{LayerNum, LayerStack, StackTriple, SG13G2};

/// A cell-name pattern whose split pad shapes are connected by construction
/// rather than by drawn geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitConnect {
    pub pattern: String,
    pub reason: String,
}

/// Promotes every drawing shape of `cell` on `layer` to a pin named `pin`.
/// Used for pad cells that carry no drawn pin markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotePin {
    pub cell: String,
    pub layer: LayerNum,
    pub pin: String,
}

/// Expands to `name[0] .. name[width-1]` in the expected top-pad list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSpec {
    pub name: String,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Top cell override; auto-detected from the hierarchy when unset.
    pub top: Option<String>,
    /// Metal/via adjacency triples, bottom to top.
    pub stack: Vec<StackTriple>,
    pub drawing_datatype: i16,
    pub pin_datatype: i16,
    pub label_texttype: i16,
    /// GDS property attribute carrying a pin name.
    pub pin_name_attr: i16,
    /// Instances of cells with this name prefix are pre-flattened into the
    /// top cell so their geometry participates directly.
    pub via_cell_prefix: String,
    /// Applied in order, before the completeness check.
    pub implicit_connect: Vec<ImplicitConnect>,
    pub promote_pins: Vec<PromotePin>,
    /// Top-level pads expected by downstream consumers, seeded even when
    /// unconnected.
    pub expected_pads: Vec<String>,
    pub expected_buses: Vec<BusSpec>,
}

impl Default for ExtractConfig {
    /// The IHP sg13g2 profile of the original extraction flow.
    fn default() -> Self {
        Self {
            top: None,
            stack: SG13G2.triples().collect(),
            drawing_datatype: 0,
            pin_datatype: 2,
            label_texttype: 25,
            pin_name_attr: 1,
            via_cell_prefix: "VIA".to_string(),
            implicit_connect: vec![
                ImplicitConnect {
                    pattern: "^sg13g2_IO.*".to_string(),
                    reason: "IO ring cells tie their segmented pad shapes internally".to_string(),
                },
                ImplicitConnect {
                    pattern: "^sg13g2_Corner.*".to_string(),
                    reason: "corner cells carry every ring rail through as one pad".to_string(),
                },
            ],
            promote_pins: vec![PromotePin {
                cell: "bondpad_70x70".to_string(),
                layer: 134,
                pin: "pad".to_string(),
            }],
            expected_pads: Vec::new(),
            expected_buses: vec![BusSpec {
                name: "pad_raw".to_string(),
                width: 64,
            }],
        }
    }
}

impl ExtractConfig {
    pub fn layer_stack(&self) -> Result<LayerStack> {
        LayerStack::from_triples(&self.stack).context("invalid layer stack")
    }

    /// The full expected top-pad list: explicit names plus bus expansions.
    pub fn expected_pad_names(&self) -> Vec<String> {
        let mut names = self.expected_pads.clone();
        for bus in &self.expected_buses {
            for i in 0..bus.width {
                names.push(crate::bus_bit(&bus.name, i));
            }
        }
        names
    }
}

pub fn parse_extract_config(path: impl AsRef<Path>) -> Result<ExtractConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let cfg = ExtractConfig::default();
        let stack = cfg.layer_stack().unwrap();
        assert_eq!(stack.metals(), &[8, 10, 30, 50, 67, 126, 134]);
        assert_eq!(cfg.drawing_datatype, 0);
        assert_eq!(cfg.pin_datatype, 2);
        assert_eq!(cfg.label_texttype, 25);
        let pads = cfg.expected_pad_names();
        assert_eq!(pads.len(), 64);
        assert_eq!(pads[0], "pad_raw[0]");
        assert_eq!(pads[63], "pad_raw[63]");
    }

    #[test]
    fn test_parse_partial_toml() {
        let cfg: ExtractConfig = toml::from_str(
            r#"
            top = "chip_top"
            via_cell_prefix = "via_"

            [[stack]]
            bottom = 1
            via = 2
            top = 3

            [[implicit_connect]]
            pattern = "^ring_.*"
            reason = "ring segments are continuous by construction"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.top.as_deref(), Some("chip_top"));
        assert_eq!(cfg.stack.len(), 1);
        assert_eq!(cfg.stack[0].via, 2);
        assert_eq!(cfg.implicit_connect.len(), 1);
        // Unspecified fields fall back to the sg13g2 profile.
        assert_eq!(cfg.pin_datatype, 2);
    }
}
