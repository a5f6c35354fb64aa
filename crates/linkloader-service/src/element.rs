use std::fmt;

use bytes::Bytes;
use serde::Serialize;

use crate::mime::MediaCategory;

/// What is currently known about a linked element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementState {
    /// Nothing is known about the element.
    Absent,
    /// A fetch is in flight.
    Loading,
    /// The element was fetched successfully.
    Loaded { content_type: String, bytes: Bytes },
    /// The last fetch failed or was cancelled.
    Failed,
}

impl ElementState {
    fn name(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Loading => "loading",
            Self::Loaded { .. } => "loaded",
            Self::Failed => "failed",
        }
    }
}

/// An immutable snapshot of the cache state of one identifier.
///
/// A new snapshot is produced on every state transition, so a snapshot handed out to a
/// renderer never changes underneath it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkedElement {
    id: String,
    state: ElementState,
}

impl LinkedElement {
    pub fn new(id: impl Into<String>, state: ElementState) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }

    pub fn absent(id: impl Into<String>) -> Self {
        Self::new(id, ElementState::Absent)
    }

    pub fn loading(id: impl Into<String>) -> Self {
        Self::new(id, ElementState::Loading)
    }

    pub fn loaded(id: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        let content_type = content_type.into();
        Self::new(
            id,
            ElementState::Loaded {
                content_type,
                bytes,
            },
        )
    }

    pub fn failed(id: impl Into<String>) -> Self {
        Self::new(id, ElementState::Failed)
    }

    /// The identifier this element was requested with.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &ElementState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ElementState::Loading)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ElementState::Loaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, ElementState::Failed)
    }

    /// The declared content type, if the element is loaded.
    pub fn content_type(&self) -> Option<&str> {
        match &self.state {
            ElementState::Loaded { content_type, .. } => Some(content_type),
            _ => None,
        }
    }

    /// The raw content, if the element is loaded.
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.state {
            ElementState::Loaded { bytes, .. } => Some(bytes),
            _ => None,
        }
    }

    /// Template properties describing a loaded element.
    ///
    /// Returns `None` unless the element is loaded.
    pub fn properties(&self) -> Option<ElementProperties> {
        let ElementState::Loaded {
            content_type,
            bytes,
        } = &self.state
        else {
            return None;
        };

        let size = bytes.len() as u64;
        Some(ElementProperties {
            kind: MediaCategory::of(content_type),
            size,
            size_human: format_size(size),
        })
    }
}

impl fmt::Display for LinkedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.state.name())
    }
}

/// Properties of a loaded element, as exposed to page templates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementProperties {
    #[serde(rename = "type", serialize_with = "serialize_category")]
    pub kind: MediaCategory,
    pub size: u64,
    pub size_human: String,
}

fn serialize_category<S: serde::Serializer>(
    category: &MediaCategory,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(category.as_ref())
}

/// Formats a byte count with binary units, e.g. `1.5 KiB`.
fn format_size(size: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

    if size < 1024 {
        return format!("{size} B");
    }

    let mut value = size as f64 / 1024.0;
    let mut unit = UNITS[0];
    for next in &UNITS[1..] {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{value:.1} {unit}")
}
