//! Read-only query surface over one parsed portal page.
//!
//! Every query answers "nothing found" with `None`, an empty string or an
//! empty iterator. Callers treat absence as a normal outcome.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("valid selector"));

pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    /// Innermost `<td>` cells whose rendered text contains `needle`.
    ///
    /// Layout cells wrapping a whole label table also "contain" the label, so
    /// a cell only counts if none of its nested cells matches too.
    pub fn label_cells<'a>(&'a self, needle: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.html.select(&CELL).filter(move |cell| {
            raw_text(*cell).contains(needle)
                && !cell
                    .select(&CELL)
                    .any(|inner| inner != *cell && raw_text(inner).contains(needle))
        })
    }

    pub fn first_label_cell<'a>(&'a self, needle: &'a str) -> Option<ElementRef<'a>> {
        self.label_cells(needle).next()
    }

    /// Every element whose `id` attribute contains `fragment`.
    pub fn by_id_fragment<'a>(&'a self, fragment: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        by_id_fragment_within(self.root(), fragment)
    }

    /// Every element whose `id` attribute ends with `suffix`.
    pub fn by_id_suffix<'a>(&'a self, suffix: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        by_id_suffix_within(self.root(), suffix)
    }

    /// Trimmed text of the first element matching `fragment`, or `""`.
    pub fn id_text(&self, fragment: &str) -> String {
        self.by_id_fragment(fragment)
            .next()
            .map(text_of)
            .unwrap_or_default()
    }
}

pub fn by_id_fragment_within<'a>(
    scope: ElementRef<'a>,
    fragment: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    elements_within(scope).filter(move |el| {
        el.value()
            .id()
            .is_some_and(|id| id_fragment_matches(id, fragment))
    })
}

pub fn by_id_suffix_within<'a>(
    scope: ElementRef<'a>,
    suffix: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    elements_within(scope).filter(move |el| el.value().id().is_some_and(|id| id.ends_with(suffix)))
}

fn elements_within(scope: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    scope.descendants().filter_map(ElementRef::wrap)
}

/// Substring match on an element id. A fragment ending in a digit must not be
/// followed by another digit, so `subName_1` never matches `subName_12`.
pub fn id_fragment_matches(id: &str, fragment: &str) -> bool {
    if fragment.is_empty() {
        return false;
    }
    let numeric_tail = fragment.bytes().last().is_some_and(|b| b.is_ascii_digit());
    id.match_indices(fragment).any(|(at, _)| {
        !numeric_tail
            || !id[at + fragment.len()..]
                .bytes()
                .next()
                .is_some_and(|b| b.is_ascii_digit())
    })
}

/// The `n`th following sibling element; `n == 0` is the element itself.
pub fn nth_next_sibling(el: ElementRef<'_>, n: usize) -> Option<ElementRef<'_>> {
    if n == 0 {
        return Some(el);
    }
    el.next_siblings().filter_map(ElementRef::wrap).nth(n - 1)
}

/// Closest element named `tag`, starting with `el` itself.
pub fn closest<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find(|e| e.value().name() == tag)
}

/// The table row `n` rows after the row containing `el`.
pub fn next_row(el: ElementRef<'_>, n: usize) -> Option<ElementRef<'_>> {
    closest(el, "tr").and_then(|row| nth_next_sibling(row, n))
}

fn raw_text(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Rendered text of `el`, trimmed.
pub fn text_of(el: ElementRef<'_>) -> String {
    raw_text(el).trim().to_string()
}

/// Rendered text of `el` without trimming, for rules that care about spacing.
pub fn untrimmed_text_of(el: ElementRef<'_>) -> String {
    raw_text(el)
}
