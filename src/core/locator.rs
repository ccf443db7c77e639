//! Fallback lookup of the text being composed.
//!
//! Used when a send click arrives but no text change was tracked for the
//! app. We search the visible windows for the focused edit field and read
//! its current text.

use crate::collector::types::{UiNode, UiWindow};

/// Class name of the platform's editable text widget.
pub const EDIT_TEXT_CLASS: &str = "android.widget.EditText";

/// Text of the first focused edit field across `windows`, in window order.
///
/// Windows without a root, and focused fields reporting no text at all, are
/// skipped. The first field with text decides: if that text is empty there is
/// nothing to report.
pub fn locate_focused_text(windows: &[UiWindow]) -> Option<String> {
    windows
        .iter()
        .filter_map(|window| window.root.as_ref())
        .filter_map(find_focused_editable)
        .find_map(|node| node.text.as_deref())
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Depth-first, pre-order search for a focused edit field.
pub fn find_focused_editable(root: &UiNode) -> Option<&UiNode> {
    if root.focused && root.class_name.as_deref() == Some(EDIT_TEXT_CLASS) {
        return Some(root);
    }
    root.children.iter().find_map(find_focused_editable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(text: &str, focused: bool) -> UiNode {
        let node = UiNode::default().with_class(EDIT_TEXT_CLASS).with_text(text);
        if focused {
            node.focused()
        } else {
            node
        }
    }

    #[test]
    fn test_finds_nested_focused_edit() {
        let root = UiNode::default()
            .with_class("android.widget.FrameLayout")
            .with_child(edit("not me", false))
            .with_child(
                UiNode::default()
                    .with_class("android.widget.LinearLayout")
                    .with_child(edit("draft message", true)),
            );
        assert_eq!(
            locate_focused_text(&[UiWindow::new(root)]).as_deref(),
            Some("draft message")
        );
    }

    #[test]
    fn test_first_match_in_depth_first_order() {
        let root = UiNode::default()
            .with_child(UiNode::default().with_child(edit("deep first", true)))
            .with_child(edit("shallow second", true));
        assert_eq!(
            locate_focused_text(&[UiWindow::new(root)]).as_deref(),
            Some("deep first")
        );
    }

    #[test]
    fn test_skips_missing_roots_and_keeps_window_order() {
        let windows = vec![
            UiWindow::default(),
            UiWindow::new(edit("from second", true)),
            UiWindow::new(edit("from third", true)),
        ];
        assert_eq!(
            locate_focused_text(&windows).as_deref(),
            Some("from second")
        );
    }

    #[test]
    fn test_empty_focused_field_wins_over_later_windows() {
        let windows = vec![
            UiWindow::new(edit("", true)),
            UiWindow::new(edit("other window", true)),
        ];
        assert_eq!(locate_focused_text(&windows), None);
    }

    #[test]
    fn test_focused_field_without_text_is_skipped() {
        let no_text = UiNode::default().with_class(EDIT_TEXT_CLASS).focused();
        let windows = vec![
            UiWindow::new(no_text),
            UiWindow::new(edit("second window", true)),
        ];
        assert_eq!(
            locate_focused_text(&windows).as_deref(),
            Some("second window")
        );
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(locate_focused_text(&[]), None);
        let windows = vec![UiWindow::new(edit("unfocused", false))];
        assert_eq!(locate_focused_text(&windows), None);
    }

    #[test]
    fn test_focused_non_edit_is_ignored() {
        let root = UiNode::default()
            .with_class("android.widget.Button")
            .with_text("Send")
            .focused();
        assert!(find_focused_editable(&root).is_none());
    }
}
