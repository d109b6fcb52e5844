//! Panel registry descriptors.
//!
//! The backend announces the set of navigable user interfaces as an ordered
//! sequence of descriptors. A descriptor is either a leaf panel backed by one
//! content frame, or a group whose sub-panels share the owning frame.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// One navigable UI panel, possibly a group with nested sub-panels.
///
/// Descriptors are immutable once registered; the registry is replaced
/// wholesale when the backend announces a new interface set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum PanelDescriptor {
    /// A panel backed directly by a content frame.
    Leaf {
        id: String,
        /// Source URL loaded into the panel's content frame.
        source: String,
    },
    /// A group of sub-panels sharing one content frame.
    Group {
        id: String,
        /// Ordered sub-panels; the first leaf provides the initial source.
        children: Vec<PanelDescriptor>,
    },
}

impl PanelDescriptor {
    pub fn leaf(id: impl Into<String>, source: impl Into<String>) -> Self {
        Self::Leaf {
            id: id.into(),
            source: source.into(),
        }
    }

    pub fn group(id: impl Into<String>, children: Vec<PanelDescriptor>) -> Self {
        Self::Group {
            id: id.into(),
            children,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Leaf { id, .. } | Self::Group { id, .. } => id,
        }
    }

    /// Source URL the owning frame initially loads: the leaf's own source,
    /// or the first leaf of a group. `None` for an empty group.
    pub fn initial_source(&self) -> Option<&str> {
        match self {
            Self::Leaf { source, .. } => Some(source),
            Self::Group { children, .. } => {
                children.iter().find_map(PanelDescriptor::initial_source)
            }
        }
    }

    /// Source URL for a given panel id inside this descriptor, if any.
    pub fn source_of(&self, panel_id: &str) -> Option<&str> {
        match self {
            Self::Leaf { id, source } if id == panel_id => Some(source),
            Self::Leaf { .. } => None,
            Self::Group { id, children } => {
                if id == panel_id {
                    self.initial_source()
                } else {
                    children.iter().find_map(|c| c.source_of(panel_id))
                }
            }
        }
    }

    /// True if this descriptor or any nested child carries the id.
    pub fn contains(&self, panel_id: &str) -> bool {
        match self {
            Self::Leaf { id, .. } => id == panel_id,
            Self::Group { id, children } => {
                id == panel_id || children.iter().any(|c| c.contains(panel_id))
            }
        }
    }
}

/// A flattened leaf panel together with its owning top-level panel id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatPanel {
    pub id: String,
    pub source: String,
    /// Top-level registry entry whose frame displays this leaf.
    pub owner: String,
}

/// Flatten an ordered registry into its leaf sequence, preserving order.
///
/// The leaf sequence is what navigation-key matching runs over.
pub fn flatten(panels: &[PanelDescriptor]) -> Vec<FlatPanel> {
    let mut flat = Vec::new();
    for panel in panels {
        collect(panel, panel.id(), &mut flat);
    }
    flat
}

fn collect(panel: &PanelDescriptor, owner: &str, out: &mut Vec<FlatPanel>) {
    match panel {
        PanelDescriptor::Leaf { id, source } => out.push(FlatPanel {
            id: id.clone(),
            source: source.clone(),
            owner: owner.to_string(),
        }),
        PanelDescriptor::Group { children, .. } => {
            for child in children {
                collect(child, owner, out);
            }
        }
    }
}
