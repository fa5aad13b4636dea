use scraper::{ElementRef, Html, Selector};

const HIDDEN_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Visible text of a document: every text node trimmed, empty ones dropped,
/// the rest joined by newlines. Table cells and inline runs land on their own
/// lines, which the line grammars rely on.
pub fn visible_text(document: &Html) -> String {
    let mut lines = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .map_or(false, |p| HIDDEN_ELEMENTS.contains(&p.value().name()));
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }
    lines.join("\n")
}

/// Text of an element with each text node trimmed and joined by `sep`.
pub fn element_text(element: ElementRef, sep: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// Parses a selector that is known to be valid at compile time.
pub fn selector(css: &'static str) -> Selector {
    match Selector::parse(css) {
        Ok(selector) => selector,
        Err(e) => panic!("invalid selector {css}: {e:?}"),
    }
}
