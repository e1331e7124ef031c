use scraper::{ElementRef, Html};

/// Upper bound on nodes visited after an anchor before a field is given up.
pub const MAX_SCAN_STEPS: usize = 100;

/// A parsed document flattened into pre-order (document order), one slot per
/// node. Text nodes keep their trimmed content, every other node is `None`.
pub struct NodeSeq<'a> {
    doc: &'a Html,
    texts: Vec<Option<&'a str>>,
}

impl<'a> NodeSeq<'a> {
    pub fn new(doc: &'a Html) -> Self {
        let texts = doc
            .tree
            .root()
            .descendants()
            .map(|node| {
                node.value()
                    .as_text()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
            })
            .collect();
        NodeSeq { doc, texts }
    }

    /// Every element in document order.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.doc.tree.root().descendants().filter_map(ElementRef::wrap)
    }

    /// Index of `el` in the sequence.
    pub fn position(&self, el: ElementRef<'a>) -> Option<usize> {
        let id = el.id();
        self.doc.tree.root().descendants().position(|n| n.id() == id)
    }

    /// Walks forward from `start` (inclusive) for at most `max_steps` further
    /// nodes and returns the first text accepted by `accept`.
    pub fn scan_forward<F>(&self, start: usize, max_steps: usize, accept: F) -> Option<&'a str>
    where
        F: Fn(&str) -> bool,
    {
        self.texts
            .iter()
            .skip(start)
            .take(max_steps.saturating_add(1))
            .flatten()
            .copied()
            .find(|t| accept(t))
    }
}

/// Concatenated direct text children of `el`, trimmed.
pub fn own_text(el: ElementRef<'_>) -> String {
    el.children()
        .filter_map(|c| c.value().as_text().map(|t| &**t))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Full descendant text of `el`, trimmed.
pub fn full_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}
