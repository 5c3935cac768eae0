//! The room's shared notes pad.

/// Plain text shared by everyone in a room.
///
/// The content is replaced wholesale on every edit; concurrent edits resolve
/// last-write-wins like the canvas put channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextPad {
    content: String,
}

impl TextPad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Replace the content. Returns false if it was already equal.
    pub fn replace(&mut self, content: impl Into<String>) -> bool {
        let content = content.into();
        if content == self.content {
            return false;
        }
        self.content = content;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_reports_changes() {
        let mut pad = TextPad::new();
        assert!(pad.is_empty());
        assert!(pad.replace("shopping list"));
        assert!(!pad.replace("shopping list"));
        assert_eq!(pad.content(), "shopping list");

        assert!(pad.replace(""));
        assert!(pad.is_empty());
    }
}
