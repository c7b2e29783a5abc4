//! Accessible graph view.
//!
//! [`GraphView`] owns the one authoritative [`SelectionState`] for the
//! topology graph. Pointer gestures and keyboard commands both funnel into
//! the same operations, so the two input paths cannot drift apart: a node
//! reached by clicking and the same node reached by cycling the keyboard
//! focus leave identical state behind.
//!
//! Keyboard traversal follows the canonical order (the model's node
//! order), independent of where the renderer draws anything. Rendering
//! itself goes through the narrow [`Renderer`] port so the view works the
//! same over a canvas, a terminal, or a test double.

use crate::topology::{GraphNode, NodeShape, SeverityTier, TopologyModel};
use anyhow::Result;

/// Zoom factor bounds; zoom operations clamp into this range.
pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 4.0;
/// Multiplicative step per zoom in/out
const ZOOM_STEP: f64 = 1.2;

/// Current selection; `None` means nothing selected. If set, the id always
/// references a node present in the current model.
pub type SelectionState = Option<String>;

/// Direction for keyboard traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Pointer gestures delivered by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerEvent {
    NodeClick(String),
    NodeDoubleClick(String),
    BackgroundClick,
}

/// Keyboard commands delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Next,
    Previous,
    Activate,
    Escape,
    ZoomIn,
    ZoomOut,
    FitView,
    Center,
}

/// Pan/zoom state. Never affects selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

/// Style resolved for one node at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStyle {
    pub shape: NodeShape,
    pub severity: SeverityTier,
    pub selected: bool,
    pub is_gateway: bool,
    pub is_offline: bool,
    pub label: String,
}

/// Rendering port. Implementations draw the model however they like; the
/// view never depends on their coordinates.
pub trait Renderer {
    fn render(
        &mut self,
        model: &TopologyModel,
        transform: &ViewTransform,
        style: &dyn Fn(&GraphNode) -> NodeStyle,
    ) -> Result<()>;
}

type SelectCallback = Box<dyn Fn(Option<&GraphNode>) + Send>;
type ActivateCallback = Box<dyn Fn(&GraphNode) + Send>;

pub struct GraphView<R: Renderer> {
    renderer: R,
    model: TopologyModel,
    selection: SelectionState,
    transform: ViewTransform,
    on_select: Option<SelectCallback>,
    on_activate: Option<ActivateCallback>,
}

impl<R: Renderer> GraphView<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            model: TopologyModel::default(),
            selection: None,
            transform: ViewTransform::default(),
            on_select: None,
            on_activate: None,
        }
    }

    /// Host callback fired whenever the selection changes.
    pub fn set_on_select(&mut self, callback: impl Fn(Option<&GraphNode>) + Send + 'static) {
        self.on_select = Some(Box::new(callback));
    }

    /// Host callback fired when the selected node is activated.
    pub fn set_on_activate(&mut self, callback: impl Fn(&GraphNode) + Send + 'static) {
        self.on_activate = Some(Box::new(callback));
    }

    pub fn model(&self) -> &TopologyModel {
        &self.model
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selected_node(&self) -> Option<&GraphNode> {
        self.selection.as_deref().and_then(|id| self.model.node(id))
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    /// Replace the model after a device-list change.
    ///
    /// Selection survives by id when the node still exists in the new
    /// model and is cleared otherwise, keeping the invariant that a
    /// non-null selection always references a live node.
    pub fn set_model(&mut self, model: TopologyModel) {
        self.model = model;
        let survives = self
            .selection
            .as_deref()
            .is_some_and(|id| self.model.node(id).is_some());
        if self.selection.is_some() && !survives {
            self.selection = None;
            self.notify_selection();
        }
    }

    /// Set or clear the selection.
    ///
    /// `None` is an intentional clear. An id with no matching node is
    /// ignored outright, leaving state unchanged, so callers can tell the
    /// two apart.
    pub fn select_node(&mut self, id: Option<&str>) {
        let next = match id {
            None => None,
            Some(id) => {
                if self.model.node(id).is_none() {
                    tracing::debug!("Ignoring selection of unknown node {}", id);
                    return;
                }
                Some(id.to_string())
            }
        };

        if next != self.selection {
            self.selection = next;
            self.notify_selection();
        }
    }

    /// Move the selection through the canonical traversal order, wrapping
    /// at either end. With nothing selected, `Next` picks the first node
    /// and `Previous` the last.
    pub fn advance_selection(&mut self, direction: Direction) {
        if self.model.nodes.is_empty() {
            return;
        }
        let count = self.model.nodes.len();

        let current = self
            .selection
            .as_deref()
            .and_then(|id| self.model.nodes.iter().position(|n| n.id == id));

        let index = match (current, direction) {
            (None, Direction::Next) => 0,
            (None, Direction::Previous) => count - 1,
            (Some(i), Direction::Next) => (i + 1) % count,
            (Some(i), Direction::Previous) => (i + count - 1) % count,
        };

        let id = self.model.nodes[index].id.clone();
        self.select_node(Some(&id));
    }

    /// Activate the selected node, equivalent to a pointer double-click.
    /// No-op with nothing selected.
    pub fn activate_selection(&mut self) {
        let Some(node) = self.selected_node() else {
            return;
        };
        tracing::debug!("Activating node {}", node.id);
        if let Some(callback) = &self.on_activate {
            callback(node);
        }
    }

    pub fn clear_selection(&mut self) {
        self.select_node(None);
    }

    pub fn zoom_in(&mut self) {
        self.transform.zoom = (self.transform.zoom * ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.transform.zoom = (self.transform.zoom / ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    /// Reset zoom and pan so the whole graph is visible.
    pub fn fit_view(&mut self) {
        self.transform = ViewTransform::default();
    }

    /// Re-center the pan without touching the zoom factor.
    pub fn center(&mut self) {
        self.transform.pan_x = 0.0;
        self.transform.pan_y = 0.0;
    }

    /// Pointer input path. Resolves to the same shared operations the
    /// keyboard path uses.
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::NodeClick(id) => self.select_node(Some(&id)),
            PointerEvent::NodeDoubleClick(id) => {
                self.select_node(Some(&id));
                self.activate_selection();
            }
            PointerEvent::BackgroundClick => self.clear_selection(),
        }
    }

    /// Keyboard input path.
    pub fn handle_key(&mut self, command: KeyCommand) {
        match command {
            KeyCommand::Next => self.advance_selection(Direction::Next),
            KeyCommand::Previous => self.advance_selection(Direction::Previous),
            KeyCommand::Activate => self.activate_selection(),
            KeyCommand::Escape => self.clear_selection(),
            KeyCommand::ZoomIn => self.zoom_in(),
            KeyCommand::ZoomOut => self.zoom_out(),
            KeyCommand::FitView => self.fit_view(),
            KeyCommand::Center => self.center(),
        }
    }

    /// Text for an assistive-technology live region describing the current
    /// selection.
    pub fn live_region_text(&self) -> String {
        match self.selected_node() {
            None => "No device selected".to_string(),
            Some(node) => {
                let mut text = format!("Selected {}", node.label());
                if node.is_gateway {
                    text.push_str(", gateway");
                }
                if node.severity != SeverityTier::None {
                    text.push_str(&format!(", {} severity", node.severity));
                }
                if node.is_offline {
                    text.push_str(", offline");
                }
                let ports = node.device.open_ports.len();
                if ports > 0 {
                    text.push_str(&format!(", {} open ports", ports));
                }
                text
            }
        }
    }

    /// Draw the current model through the renderer port.
    pub fn render(&mut self) -> Result<()> {
        let selection = self.selection.clone();
        self.renderer.render(&self.model, &self.transform, &|node| NodeStyle {
            shape: node.shape,
            severity: node.severity,
            selected: selection.as_deref() == Some(node.id.as_str()),
            is_gateway: node.is_gateway,
            is_offline: node.is_offline,
            label: node.label(),
        })
    }

    fn notify_selection(&self) {
        if let Some(callback) = &self.on_select {
            callback(self.selected_node());
        }
    }
}
