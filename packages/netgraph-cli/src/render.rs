//! Terminal renderer for the topology graph.
//!
//! Implements the core's renderer port with plain text: nodes grouped by
//! ring level from the center outwards, the selected node marked, edges
//! summarized. Good enough for headless boxes and scripts; a GUI host
//! would plug its own renderer into the same port.

use anyhow::Result;
use netgraph_core::topology::{GraphNode, NodeShape, TopologyModel};
use netgraph_core::view::{NodeStyle, Renderer, ViewTransform};
use std::io::Write;

fn glyph(shape: NodeShape) -> char {
    match shape {
        NodeShape::Diamond => '◆',
        NodeShape::Square => '■',
        NodeShape::Triangle => '▲',
        NodeShape::Circle => '●',
    }
}

pub struct TextRenderer<W: Write> {
    out: W,
}

impl TextRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn render(
        &mut self,
        model: &TopologyModel,
        transform: &ViewTransform,
        style: &dyn Fn(&GraphNode) -> NodeStyle,
    ) -> Result<()> {
        if model.is_empty() {
            writeln!(self.out, "(no devices)")?;
            return Ok(());
        }

        writeln!(
            self.out,
            "Topology: {} devices, {} links  [zoom {:.2}x]",
            model.nodes.len(),
            model.edges.len(),
            transform.zoom
        )?;

        // Rings from the center outwards
        let mut rings: Vec<u8> = model.nodes.iter().map(|n| n.ring_level).collect();
        rings.sort_unstable_by(|a, b| b.cmp(a));
        rings.dedup();

        for ring in rings {
            for node in model.nodes.iter().filter(|n| n.ring_level == ring) {
                let s = style(node);
                let marker = if s.selected { ">" } else { " " };
                let mut flags = String::new();
                if s.is_gateway {
                    flags.push_str(" [gateway]");
                }
                if s.is_offline {
                    flags.push_str(" [offline]");
                }
                writeln!(
                    self.out,
                    "{} {} {}  severity: {}{}",
                    marker,
                    glyph(s.shape),
                    s.label,
                    s.severity,
                    flags
                )?;
            }
        }

        Ok(())
    }
}
