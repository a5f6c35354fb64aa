//! Decides which declared content types are worth downloading for inline embedding.

use std::fmt;

/// The top-level category of a MIME type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Image,
    Audio,
    Video,
    Text,
    /// Anything else, including malformed content types.
    Other,
}

impl MediaCategory {
    /// Classifies a content type such as `image/png; charset=binary` by its top-level type.
    ///
    /// MIME types are case-insensitive. Subtypes and parameters are not looked at.
    pub fn of(content_type: &str) -> Self {
        let top_level = content_type
            .split(['/', ';'])
            .next()
            .unwrap_or_default()
            .trim();

        if top_level.eq_ignore_ascii_case("image") {
            Self::Image
        } else if top_level.eq_ignore_ascii_case("audio") {
            Self::Audio
        } else if top_level.eq_ignore_ascii_case("video") {
            Self::Video
        } else if top_level.eq_ignore_ascii_case("text") {
            Self::Text
        } else {
            Self::Other
        }
    }

    /// Whether elements of this category can be embedded inline.
    pub fn is_embeddable(self) -> bool {
        matches!(self, Self::Image)
    }
}

impl AsRef<str> for MediaCategory {
    fn as_ref(&self) -> &str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Text => "text",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Returns `true` if a fetch with the given declared content type should be aborted.
///
/// Only images are kept.
pub fn should_cancel(content_type: &str) -> bool {
    !MediaCategory::of(content_type).is_embeddable()
}
