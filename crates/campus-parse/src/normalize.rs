use ego_tree::NodeId;
use scraper::{ElementRef, Node};
use std::ops::Deref;
use unicode_normalization::UnicodeNormalization;

/// NFC-normalize and collapse every whitespace run to a single space.
pub fn normalize_text(input: &str) -> String {
    let nfc: String = input.nfc().collect();
    nfc.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text content of an element with `<br>` read as a line break, normalized.
pub fn cell_text(element: ElementRef) -> String {
    normalize_text(&collect_all_text(element.id(), element.tree()))
}

/// Collect all text content under a node, recursively.
fn collect_all_text(node_id: NodeId, tree: &ego_tree::Tree<Node>) -> String {
    let Some(node) = tree.get(node_id) else {
        return String::new();
    };
    let mut text = String::new();

    for child in node.children() {
        match child.value() {
            Node::Text(t) => text.push_str(t.deref()),
            Node::Element(elem) => match elem.name() {
                "br" => text.push('\n'),
                "script" | "style" => {}
                _ => text.push_str(&collect_all_text(child.id(), tree)),
            },
            _ => {}
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_normalize_nfc_and_whitespace() {
        assert_eq!(normalize_text("  Data\n\t Structures  "), "Data Structures");
        assert_eq!(normalize_text("e\u{0301}tude"), "étude");
    }

    #[test]
    fn test_cell_text_breaks_and_scripts() {
        let html = Html::parse_fragment(
            "<table><tr><td>CS101<br>Data <b>Structures</b><script>x()</script></td></tr></table>",
        );
        let td = html.select(&Selector::parse("td").unwrap()).next().unwrap();
        assert_eq!(cell_text(td), "CS101 Data Structures");
    }
}
