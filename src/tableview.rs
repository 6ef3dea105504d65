use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::trace;

/// Capability interface the table logic needs from its backing row store.
///
/// Rows are addressed by their current position. Filtering only flips
/// visibility flags, sorting only reorders; `reorder` must carry each row
/// (including its visibility flag) to its new position.
pub trait RowSource {
    fn len(&self) -> usize;
    /// Text of the cell at (row, column), or None if the row is too short.
    fn cell(&self, row: usize, column: usize) -> Option<&str>;
    fn is_visible(&self, row: usize) -> bool;
    fn set_visible(&mut self, row: usize, visible: bool);
    /// Apply a permutation: position i afterwards holds the row that was
    /// at order[i]. Callers pass a permutation of 0..len.
    fn reorder(&mut self, order: &[usize]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn label(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Numeric,
}

/// Filter and sort state over a row store.
///
/// Each instance remembers the last applied direction per column, so
/// sorting a column again flips it. The memory is scoped to the view,
/// not shared anywhere.
pub struct TableView<S: RowSource> {
    source: S,
    filter_column: usize,
    sort_state: HashMap<usize, SortDirection>,
}

impl<S: RowSource> TableView<S> {
    pub fn new(source: S, filter_column: usize) -> Self {
        TableView {
            source,
            filter_column,
            sort_state: HashMap::new(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn direction(&self, column: usize) -> Option<SortDirection> {
        self.sort_state.get(&column).copied()
    }

    /// Positions of the rows the filter currently shows, in row order.
    pub fn visible_rows(&self) -> Vec<usize> {
        (0..self.source.len())
            .filter(|&row| self.source.is_visible(row))
            .collect()
    }

    /// Show rows whose filter-column text contains `query`, hide the rest.
    /// Matching is case insensitive, the empty query matches everything.
    /// Rows without a filter cell keep their previous visibility.
    pub fn filter(&mut self, query: &str) {
        let needle = query.to_lowercase();
        for row in 0..self.source.len() {
            let shown = match self.source.cell(row, self.filter_column) {
                Some(text) => text.to_lowercase().contains(&needle),
                None => continue,
            };
            self.source.set_visible(row, shown);
        }
        trace!(
            "Filter \"{}\" shows {}/{} rows",
            query,
            self.visible_rows().len(),
            self.source.len()
        );
    }

    /// Sort all rows by `column`, flipping the remembered direction for
    /// that column first. Returns the direction that was applied.
    ///
    /// Keys are the trimmed cell texts. Numeric keys keep only digits and
    /// dots before parsing; keys that do not survive that as a number
    /// compare as NaN, and the relative order of such rows is unspecified.
    /// The reorder is stable, equal keys keep their prior relative order.
    pub fn sort(&mut self, column: usize, kind: ValueKind) -> SortDirection {
        let direction = match self.sort_state.get(&column) {
            Some(SortDirection::Ascending) => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        self.sort_state.insert(column, direction);

        let keys: Vec<String> = (0..self.source.len())
            .map(|row| {
                self.source
                    .cell(row, column)
                    .unwrap_or("")
                    .trim()
                    .to_string()
            })
            .collect();

        let mut order: Vec<usize> = (0..keys.len()).collect();
        match kind {
            ValueKind::Numeric => {
                let values: Vec<f64> = keys.iter().map(|k| numeric_key(k)).collect();
                order.sort_by(|&a, &b| {
                    let ord = values[a]
                        .partial_cmp(&values[b])
                        .unwrap_or(Ordering::Equal);
                    oriented(ord, direction)
                });
            }
            ValueKind::Text => {
                let folded: Vec<String> = keys.iter().map(|k| k.to_lowercase()).collect();
                order.sort_by(|&a, &b| {
                    let ord = folded[a]
                        .cmp(&folded[b])
                        .then_with(|| keys[a].cmp(&keys[b]));
                    oriented(ord, direction)
                });
            }
        }

        self.source.reorder(&order);
        trace!("Sorted column {} {}", column, direction.label());
        direction
    }
}

fn oriented(ord: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ord,
        SortDirection::Descending => ord.reverse(),
    }
}

// "10 items" -> 10.0, "0x40" -> 40.0 (digits survive, the prefix does not).
fn numeric_key(raw: &str) -> f64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    cleaned.parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal in-memory store used to exercise the view without a report.
    struct Rows {
        rows: Vec<(Vec<String>, bool)>,
    }

    impl Rows {
        fn new(cells: Vec<Vec<&str>>) -> Self {
            Rows {
                rows: cells
                    .into_iter()
                    .map(|row| (row.into_iter().map(|s| s.to_string()).collect(), true))
                    .collect(),
            }
        }

        fn column(&self, idx: usize) -> Vec<String> {
            self.rows.iter().map(|(cells, _)| cells[idx].clone()).collect()
        }

        fn visible_column(&self, idx: usize) -> Vec<String> {
            self.rows
                .iter()
                .filter(|(_, visible)| *visible)
                .map(|(cells, _)| cells[idx].clone())
                .collect()
        }
    }

    impl RowSource for Rows {
        fn len(&self) -> usize {
            self.rows.len()
        }

        fn cell(&self, row: usize, column: usize) -> Option<&str> {
            self.rows
                .get(row)
                .and_then(|(cells, _)| cells.get(column))
                .map(|s| s.as_str())
        }

        fn is_visible(&self, row: usize) -> bool {
            self.rows[row].1
        }

        fn set_visible(&mut self, row: usize, visible: bool) {
            self.rows[row].1 = visible;
        }

        fn reorder(&mut self, order: &[usize]) {
            let mut taken: Vec<Option<(Vec<String>, bool)>> =
                self.rows.drain(..).map(Some).collect();
            self.rows = order.iter().map(|&idx| taken[idx].take().unwrap()).collect();
        }
    }

    fn view(cells: Vec<Vec<&str>>) -> TableView<Rows> {
        TableView::new(Rows::new(cells), 0)
    }

    #[test]
    fn filter_matches_substring_case_insensitive() {
        let mut tv = view(vec![vec!["alloc_page"], vec!["free_page"], vec!["main"]]);
        tv.filter("PAGE");
        assert_eq!(tv.visible_rows(), vec![0, 1]);
        tv.filter("main");
        assert_eq!(tv.visible_rows(), vec![2]);
    }

    #[test]
    fn empty_filter_shows_every_row() {
        let mut tv = view(vec![vec!["a"], vec!["b"], vec!["c"]]);
        tv.filter("b");
        assert_eq!(tv.visible_rows(), vec![1]);
        tv.filter("");
        assert_eq!(tv.visible_rows(), vec![0, 1, 2]);
    }

    #[test]
    fn filter_skips_rows_without_the_cell() {
        let mut tv = view(vec![vec!["first"], vec![], vec!["third"]]);
        tv.filter("zzz");
        // The ragged row keeps its previous (visible) state.
        assert_eq!(tv.visible_rows(), vec![1]);
    }

    #[test]
    fn filter_does_not_reorder() {
        let mut tv = view(vec![vec!["b"], vec!["a"], vec!["c"]]);
        tv.filter("");
        assert_eq!(tv.source().column(0), vec!["b", "a", "c"]);
    }

    #[test]
    fn numeric_sort_is_numeric_not_lexicographic() {
        let mut tv = view(vec![vec!["3 items"], vec!["10 items"], vec!["2 items"]]);
        tv.sort(0, ValueKind::Numeric);
        assert_eq!(
            tv.source().column(0),
            vec!["2 items", "3 items", "10 items"]
        );
    }

    #[test]
    fn sorting_twice_reverses() {
        let mut tv = view(vec![vec!["3"], vec!["10"], vec!["2"]]);
        tv.sort(0, ValueKind::Numeric);
        let first: Vec<String> = tv.source().column(0);
        tv.sort(0, ValueKind::Numeric);
        let second: Vec<String> = tv.source().column(0);
        let reversed: Vec<String> = first.into_iter().rev().collect();
        assert_eq!(second, reversed);
        assert_eq!(tv.direction(0), Some(SortDirection::Descending));
    }

    #[test]
    fn text_sort_folds_case() {
        let mut tv = view(vec![vec!["Banana"], vec!["apple"], vec!["Cherry"]]);
        tv.sort(0, ValueKind::Text);
        assert_eq!(tv.source().column(0), vec!["apple", "Banana", "Cherry"]);
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut tv = view(vec![
            vec!["1", "first"],
            vec!["0", "second"],
            vec!["1", "third"],
            vec!["0", "fourth"],
        ]);
        tv.sort(0, ValueKind::Numeric);
        assert_eq!(
            tv.source().column(1),
            vec!["second", "fourth", "first", "third"]
        );
    }

    #[test]
    fn sort_keys_are_trimmed() {
        let mut tv = view(vec![vec!["  b  "], vec!["a"]]);
        tv.sort(0, ValueKind::Text);
        assert_eq!(tv.source().column(0), vec!["a", "  b  "]);
    }

    #[test]
    fn filter_after_sort_keeps_sorted_order_of_visible_rows() {
        let mut tv = view(vec![
            vec!["beta 2"],
            vec!["alpha 3"],
            vec!["beta 1"],
            vec!["alpha 1"],
        ]);
        tv.sort(0, ValueKind::Text);
        tv.filter("beta");
        assert_eq!(tv.source().visible_column(0), vec!["beta 1", "beta 2"]);
        // Hidden rows were not moved either.
        assert_eq!(
            tv.source().column(0),
            vec!["alpha 1", "alpha 3", "beta 1", "beta 2"]
        );
    }

    #[test]
    fn sort_carries_visibility_with_rows() {
        let mut tv = view(vec![vec!["carol"], vec!["alice"], vec!["bob"]]);
        tv.filter("bob");
        assert_eq!(tv.visible_rows(), vec![2]);
        tv.sort(0, ValueKind::Text);
        assert_eq!(tv.source().column(0), vec!["alice", "bob", "carol"]);
        assert_eq!(tv.visible_rows(), vec![1]);
    }

    #[test]
    fn direction_memory_is_per_column() {
        let mut tv = view(vec![vec!["b", "1"], vec!["a", "2"]]);
        tv.sort(0, ValueKind::Text);
        tv.sort(1, ValueKind::Numeric);
        assert_eq!(tv.direction(0), Some(SortDirection::Ascending));
        assert_eq!(tv.direction(1), Some(SortDirection::Ascending));
        tv.sort(0, ValueKind::Text);
        assert_eq!(tv.direction(0), Some(SortDirection::Descending));
        assert_eq!(tv.direction(1), Some(SortDirection::Ascending));
    }

    #[test]
    fn numeric_key_strips_non_numeric_characters() {
        assert_eq!(numeric_key("0x40"), 40.0);
        assert_eq!(numeric_key(" 12 kb "), 12.0);
        assert_eq!(numeric_key("3.5%"), 3.5);
        assert!(numeric_key("n/a").is_nan());
        assert!(numeric_key("1.2.3").is_nan());
    }
}
