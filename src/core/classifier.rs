//! Send-button detection.
//!
//! A heuristic over the clicked node's identifying attributes. False positives
//! and negatives are expected; the keyword set aims at common messaging UIs.

use crate::collector::types::UiNode;

/// Keywords that mark a node as a send control.
pub const SEND_KEYWORDS: &[&str] = &["send", "btn_send", "reply", "compose_send"];

/// Narrower keyword checked on icon-only controls.
pub const ICON_SEND_KEYWORD: &str = "send";

/// Class-name fragment identifying icon-only buttons.
const IMAGE_BUTTON_CLASS: &str = "imagebutton";

/// Decides whether a click represents the user sending a message.
pub trait SendClassifier: Send + Sync {
    fn is_send_action(&self, node: Option<&UiNode>) -> bool;
}

/// Case-insensitive keyword matching on resource id, description and text.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(SEND_KEYWORDS.iter().copied())
    }
}

impl KeywordClassifier {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn matches_any(&self, value: Option<&str>) -> bool {
        value
            .map(str::to_lowercase)
            .map(|v| self.keywords.iter().any(|k| v.contains(k.as_str())))
            .unwrap_or(false)
    }
}

fn contains_ignore_case(value: Option<&str>, needle: &str) -> bool {
    value
        .map(|v| v.to_lowercase().contains(needle))
        .unwrap_or(false)
}

impl SendClassifier for KeywordClassifier {
    fn is_send_action(&self, node: Option<&UiNode>) -> bool {
        let Some(node) = node else {
            return false;
        };

        let id = node.resource_id.as_deref();
        let description = node.description.as_deref();

        if self.matches_any(id)
            || self.matches_any(description)
            || self.matches_any(node.text.as_deref())
        {
            return true;
        }

        // Icon buttons rarely carry text; look at id and description only.
        if contains_ignore_case(node.class_name.as_deref(), IMAGE_BUTTON_CLASS) {
            return contains_ignore_case(id, ICON_SEND_KEYWORD)
                || contains_ignore_case(description, ICON_SEND_KEYWORD);
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(node: &UiNode) -> bool {
        KeywordClassifier::default().is_send_action(Some(node))
    }

    #[test]
    fn test_resource_id_match() {
        let node = UiNode::default().with_resource_id("btn_send_message");
        assert!(classify(&node));

        let node = UiNode::default().with_resource_id("com.chat:id/Compose_Send");
        assert!(classify(&node));
    }

    #[test]
    fn test_description_and_text_match() {
        assert!(classify(&UiNode::default().with_description("Send message")));
        assert!(classify(&UiNode::default().with_text("REPLY")));
    }

    #[test]
    fn test_empty_and_missing_nodes() {
        assert!(!classify(&UiNode::default()));
        assert!(!KeywordClassifier::default().is_send_action(None));
    }

    #[test]
    fn test_unrelated_button() {
        let node = UiNode::default()
            .with_resource_id("com.chat:id/attach")
            .with_description("Attach file")
            .with_text("Attach")
            .with_class("android.widget.Button");
        assert!(!classify(&node));
    }

    #[test]
    fn test_image_button_uses_id_and_description() {
        let icon = UiNode::default()
            .with_class("android.widget.ImageButton")
            .with_description("Send");
        assert!(classify(&icon));

        let icon = UiNode::default()
            .with_class("android.widget.ImageButton")
            .with_resource_id("com.chat:id/emoji");
        assert!(!classify(&icon));
    }

    #[test]
    fn test_custom_keywords() {
        let classifier = KeywordClassifier::new(["Enviar", " ", "envoyer"]);
        assert_eq!(classifier.keywords(), ["enviar", "envoyer"]);
        assert!(classifier.is_send_action(Some(&UiNode::default().with_text("ENVIAR"))));
        assert!(!classifier.is_send_action(Some(&UiNode::default().with_text("Send"))));
    }
}
