use std::cmp::Ordering;
use std::fmt;
use std::time::Instant;
use tracing::{debug, trace};

use crate::table::{Cell, Direction, Row, Table};

/// Separates a key from the original row position when a composite key is printed.
pub const KEY_SEPARATOR: &str = "-----";

/// Sort key derived from a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Cleaned numeric text, or the explicit override value of the cell.
    Numeric(String),
    /// Cleaned, upper-cased text.
    Text(String),
}

impl SortKey {
    pub fn as_str(&self) -> &str {
        match self {
            SortKey::Numeric(s) | SortKey::Text(s) => s,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, SortKey::Text(_))
    }

    /// Numeric value of the key. Keys that look numeric but do not parse
    /// (a lone "-", "1.2.3") come back as NaN.
    pub fn numeric_value(&self) -> f64 {
        parse_number(self.as_str())
    }
}

/// How a whole column is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    Numeric,
    Lexicographic,
}

/// A key together with the position of its row before the sort.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeKey {
    pub key: SortKey,
    pub position: usize,
}

impl CompositeKey {
    /// Numeric columns compare the key values, then the positions.
    /// Lexicographic columns compare the whole `KEY-----POSITION` string, so a
    /// key followed by a character below `-` orders before its own prefix.
    fn compare(&self, other: &CompositeKey, class: ColumnClass) -> Ordering {
        match class {
            ColumnClass::Numeric => {
                compare_numbers(self.key.numeric_value(), other.key.numeric_value())
                    .then(self.position.cmp(&other.position))
            }
            ColumnClass::Lexicographic => self.padded().cmp(&other.padded()),
        }
    }

    // Zero padding keeps position 10 after position 9.
    fn padded(&self) -> String {
        format!(
            "{}{}{:020}",
            self.key.as_str(),
            KEY_SEPARATOR,
            self.position
        )
    }
}

// NaN orders after every number; -0 and 0 are equal.
fn compare_numbers(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.key.as_str(), KEY_SEPARATOR, self.position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOutcome {
    /// Header has no indicator or the column does not exist. Nothing changed.
    Inert,
    /// Table body is empty. The indicator is still updated, as a header
    /// click on an empty table does in the original page.
    Empty(Direction),
    Sorted {
        direction: Direction,
        class: ColumnClass,
    },
}

fn is_blank(c: char) -> bool {
    c <= '\u{20}'
}

/// Upper-cases the text and strips surrounding whitespace and control
/// characters. Everything from the first run of two such characters on is
/// treated as an annotation and dropped: `"  42  (pending)"` becomes `"42"`.
pub fn clean_text(text: &str) -> String {
    let upper = text.to_uppercase();
    let trimmed = upper.trim_start_matches(is_blank);

    let mut end = trimmed.len();
    let mut previous_blank = false;
    for (pos, c) in trimmed.char_indices() {
        let blank = is_blank(c);
        if blank && previous_blank {
            // pos points at the second blank, cut before the first one
            end = pos - 1;
            break;
        }
        previous_blank = blank;
    }
    trimmed[..end].trim_end_matches(is_blank).to_string()
}

// ^-?[0-9,. ]*$
fn looks_numeric(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    body.chars()
        .all(|c| c.is_ascii_digit() || c == ',' || c == '.' || c == ' ')
}

fn parse_number(s: &str) -> f64 {
    let compact: String = s.chars().filter(|c| *c != ' ').collect();
    if compact.is_empty() {
        return 0.0;
    }
    let commas = compact.matches(',').count();
    let normalized = if compact.contains('.') || commas > 1 {
        compact.replace(',', "")
    } else {
        compact.replace(',', ".")
    };
    normalized.parse::<f64>().unwrap_or(f64::NAN)
}

/// Derives the sort key of a cell. An explicit sort value always wins and
/// counts as numeric.
pub fn extract_key(cell: &Cell) -> SortKey {
    if let Some(value) = &cell.sort_value {
        return SortKey::Numeric(value.clone());
    }
    let cleaned = clean_text(&cell.text);
    if looks_numeric(&cleaned) {
        SortKey::Numeric(cleaned.replace(' ', ""))
    } else {
        SortKey::Text(cleaned)
    }
}

/// Any text key forces the column into lexicographic mode.
pub fn classify(keys: &[CompositeKey]) -> ColumnClass {
    if keys.iter().any(|k| k.key.is_text()) {
        ColumnClass::Lexicographic
    } else {
        ColumnClass::Numeric
    }
}

/// Sorts `table` by `column` the way a header click does: the direction is
/// read from the header indicator and toggled on every call.
pub fn sort_by_column(table: &mut Table, column: usize) -> SortOutcome {
    let direction = match table.headers.get(column).and_then(|h| h.indicator) {
        Some(indicator) => indicator.next_direction(),
        None => {
            trace!("Header {column} of {} is not sortable", table.name);
            return SortOutcome::Inert;
        }
    };
    sort_with(table, column, direction)
}

/// Sorts `table` by `column` in an explicit direction.
pub fn sort_with(table: &mut Table, column: usize, direction: Direction) -> SortOutcome {
    if !table
        .headers
        .get(column)
        .is_some_and(|h| h.is_sortable())
    {
        return SortOutcome::Inert;
    }

    let start_time = Instant::now();
    let outcome = if table.rows.is_empty() {
        SortOutcome::Empty(direction)
    } else {
        let class = reorder_rows(&mut table.rows, column, direction);
        SortOutcome::Sorted { direction, class }
    };

    for (cidx, header) in table.headers.iter_mut().enumerate() {
        if let Some(indicator) = header.indicator.as_mut() {
            if cidx == column {
                indicator.set(direction);
            } else {
                indicator.reset();
            }
        }
    }

    debug!(
        "Sorted {} by column {column} ({:?}) in {}us",
        table.name,
        outcome,
        start_time.elapsed().as_micros()
    );
    outcome
}

fn reorder_rows(rows: &mut Vec<Row>, column: usize, direction: Direction) -> ColumnClass {
    let mut keys: Vec<CompositeKey> = rows
        .iter()
        .enumerate()
        .map(|(position, row)| CompositeKey {
            key: row
                .cells
                .get(column)
                .map(extract_key)
                .unwrap_or_else(|| SortKey::Numeric(String::new())),
            position,
        })
        .collect();

    let class = classify(&keys);
    keys.sort_by(|a, b| a.compare(b, class));
    if direction == Direction::Descending {
        keys.reverse();
    }
    trace!(
        "Ordered keys: {:?}",
        keys.iter().map(|k| k.to_string()).collect::<Vec<String>>()
    );

    let mut slots: Vec<Option<Row>> = rows.drain(..).map(Some).collect();
    rows.extend(keys.iter().filter_map(|k| slots[k.position].take()));
    class
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{GLYPH_ASCENDING, GLYPH_DESCENDING, GLYPH_UNSORTED, Header};

    fn single_column(values: &[&str]) -> Table {
        Table::new(
            "t",
            vec![Header::sortable("value")],
            values.iter().map(|v| Row::from_texts(&[*v])).collect(),
        )
    }

    fn column(table: &Table, cidx: usize) -> Vec<String> {
        table
            .rows
            .iter()
            .map(|r| r.cells[cidx].text.clone())
            .collect()
    }

    fn glyph(table: &Table, cidx: usize) -> &'static str {
        table.headers[cidx].indicator.unwrap().glyph()
    }

    #[test]
    fn numeric_column_sorts_by_value() {
        let mut table = single_column(&["10", "2", "-3"]);
        let outcome = sort_by_column(&mut table, 0);
        assert_eq!(
            outcome,
            SortOutcome::Sorted {
                direction: Direction::Ascending,
                class: ColumnClass::Numeric
            }
        );
        assert_eq!(column(&table, 0), vec!["-3", "2", "10"]);
        assert_eq!(glyph(&table, 0), GLYPH_ASCENDING);
    }

    #[test]
    fn one_text_cell_makes_column_lexicographic() {
        let mut table = single_column(&["10", "apple", "2"]);
        let outcome = sort_by_column(&mut table, 0);
        assert_eq!(
            outcome,
            SortOutcome::Sorted {
                direction: Direction::Ascending,
                class: ColumnClass::Lexicographic
            }
        );
        assert_eq!(column(&table, 0), vec!["10", "2", "apple"]);
    }

    #[test]
    fn repeated_clicks_toggle_direction() {
        let mut table = single_column(&["b", "c", "a", "b"]);
        sort_by_column(&mut table, 0);
        let first = table.rows.clone();

        sort_by_column(&mut table, 0);
        assert_eq!(glyph(&table, 0), GLYPH_DESCENDING);
        let mut reversed = first.clone();
        reversed.reverse();
        assert_eq!(table.rows, reversed);

        sort_by_column(&mut table, 0);
        assert_eq!(glyph(&table, 0), GLYPH_ASCENDING);
        assert_eq!(table.rows, first);
    }

    #[test]
    fn equal_keys_keep_document_order() {
        let mut table = Table::new(
            "t",
            vec![Header::sortable("status"), Header::sortable("id")],
            vec![
                Row::from_texts(&["open", "1"]),
                Row::from_texts(&["closed", "2"]),
                Row::from_texts(&["open", "3"]),
                Row::from_texts(&["closed", "4"]),
                Row::from_texts(&["open", "5"]),
            ],
        );
        sort_by_column(&mut table, 0);
        assert_eq!(column(&table, 1), vec!["2", "4", "1", "3", "5"]);
    }

    #[test]
    fn equal_numbers_keep_document_order() {
        let mut table = Table::new(
            "t",
            vec![Header::sortable("amount"), Header::sortable("id")],
            (0..12)
                .map(|i| {
                    let amount = if i % 2 == 0 { "5" } else { "1" };
                    Row::from_texts(&[amount, i.to_string().as_str()])
                })
                .collect(),
        );
        sort_by_column(&mut table, 0);
        assert_eq!(
            column(&table, 1),
            vec!["1", "3", "5", "7", "9", "11", "0", "2", "4", "6", "8", "10"]
        );
    }

    #[test]
    fn timestamp_override_wins_over_display() {
        let mut table = Table::new(
            "t",
            vec![Header::sortable("date")],
            vec![
                Row::new(vec![Cell::with_sort_value("Jan 5, 2024", "1704412800")]),
                Row::new(vec![Cell::with_sort_value("Dec 1, 2023", "1701388800")]),
                Row::new(vec![Cell::with_sort_value("Feb 10, 2024", "1707523200")]),
            ],
        );
        let outcome = sort_by_column(&mut table, 0);
        assert_eq!(
            outcome,
            SortOutcome::Sorted {
                direction: Direction::Ascending,
                class: ColumnClass::Numeric
            }
        );
        assert_eq!(
            column(&table, 0),
            vec!["Dec 1, 2023", "Jan 5, 2024", "Feb 10, 2024"]
        );
    }

    #[test]
    fn annotation_suffix_is_ignored() {
        assert_eq!(clean_text("  42  (pending)"), "42");
        assert_eq!(clean_text("\n   Voyage  à Rome\n "), "VOYAGE");
        assert_eq!(clean_text("trip to lyon "), "TRIP TO LYON");
        assert_eq!(
            extract_key(&Cell::new("  42  (pending)")),
            SortKey::Numeric("42".into())
        );
    }

    #[test]
    fn digit_group_spaces_are_collapsed() {
        assert_eq!(
            extract_key(&Cell::new("1 234 567")),
            SortKey::Numeric("1234567".into())
        );
        assert_eq!(
            extract_key(&Cell::new("12 apples")),
            SortKey::Text("12 APPLES".into())
        );
    }

    #[test]
    fn number_parsing_handles_separators() {
        assert_eq!(SortKey::Numeric("1,5".into()).numeric_value(), 1.5);
        assert_eq!(SortKey::Numeric("1,234.5".into()).numeric_value(), 1234.5);
        assert_eq!(SortKey::Numeric("1,234,567".into()).numeric_value(), 1234567.0);
        assert_eq!(SortKey::Numeric("".into()).numeric_value(), 0.0);
        assert!(SortKey::Numeric("-".into()).numeric_value().is_nan());
    }

    #[test]
    fn unparseable_numbers_sort_last() {
        let mut table = single_column(&["-", "3", "", "-1"]);
        sort_by_column(&mut table, 0);
        assert_eq!(column(&table, 0), vec!["-1", "", "3", "-"]);
    }

    #[test]
    fn inert_header_changes_nothing() {
        let mut table = Table::new(
            "t",
            vec![Header::inert("notes"), Header::sortable("id")],
            vec![Row::from_texts(&["b", "2"]), Row::from_texts(&["a", "1"])],
        );
        let before = table.clone();
        assert_eq!(sort_by_column(&mut table, 0), SortOutcome::Inert);
        assert_eq!(sort_by_column(&mut table, 9), SortOutcome::Inert);
        assert_eq!(table, before);
    }

    #[test]
    fn empty_table_only_updates_indicator() {
        let mut table = single_column(&[]);
        assert_eq!(
            sort_by_column(&mut table, 0),
            SortOutcome::Empty(Direction::Ascending)
        );
        assert!(table.rows.is_empty());
        assert_eq!(glyph(&table, 0), GLYPH_ASCENDING);
    }

    #[test]
    fn clicking_another_column_resets_previous_indicator() {
        let mut table = Table::new(
            "t",
            vec![Header::sortable("a"), Header::sortable("b")],
            vec![Row::from_texts(&["1", "y"]), Row::from_texts(&["2", "x"])],
        );
        sort_by_column(&mut table, 0);
        sort_by_column(&mut table, 1);
        assert_eq!(glyph(&table, 0), GLYPH_UNSORTED);
        assert_eq!(glyph(&table, 1), GLYPH_ASCENDING);

        // Back on the first column the sort starts ascending again.
        assert_eq!(
            sort_by_column(&mut table, 0),
            SortOutcome::Sorted {
                direction: Direction::Ascending,
                class: ColumnClass::Numeric
            }
        );
    }

    #[test]
    fn rows_move_with_their_cells() {
        let mut table = Table::new(
            "t",
            vec![Header::sortable("name"), Header::sortable("date")],
            vec![
                Row::new(vec![Cell::new("b"), Cell::with_sort_value("x", "2")]),
                Row::new(vec![Cell::new("a"), Cell::with_sort_value("y", "1")]),
            ],
        );
        let original = table.rows.clone();
        sort_by_column(&mut table, 0);
        assert_eq!(table.rows, vec![original[1].clone(), original[0].clone()]);
    }

    #[test]
    fn explicit_direction_is_applied() {
        let mut table = single_column(&["1", "3", "2"]);
        sort_with(&mut table, 0, Direction::Descending);
        assert_eq!(column(&table, 0), vec!["3", "2", "1"]);
        assert_eq!(glyph(&table, 0), GLYPH_DESCENDING);
    }

    #[test]
    fn key_followed_by_space_orders_before_its_prefix() {
        let mut table = single_column(&["Projet 2", "Projet"]);
        sort_by_column(&mut table, 0);
        assert_eq!(column(&table, 0), vec!["Projet 2", "Projet"]);

        let mut table = single_column(&["Projet", "Projet (old)", "Projet!"]);
        sort_by_column(&mut table, 0);
        assert_eq!(column(&table, 0), vec!["Projet (old)", "Projet!", "Projet"]);
    }

    #[test]
    fn equal_text_keys_keep_order_past_ten_rows() {
        let mut table = Table::new(
            "t",
            vec![Header::sortable("status"), Header::sortable("id")],
            (0..12)
                .map(|i| Row::from_texts(&["same", i.to_string().as_str()]))
                .collect(),
        );
        sort_by_column(&mut table, 0);
        let expected: Vec<String> = (0..12).map(|i| i.to_string()).collect();
        assert_eq!(column(&table, 1), expected);
    }

    #[test]
    fn negative_zero_ties_with_zero() {
        let mut table = single_column(&["0", "-0", "1"]);
        sort_by_column(&mut table, 0);
        assert_eq!(column(&table, 0), vec!["0", "-0", "1"]);

        let mut table = single_column(&["-0", "0"]);
        sort_by_column(&mut table, 0);
        assert_eq!(column(&table, 0), vec!["-0", "0"]);
    }

    #[test]
    fn composite_key_display() {
        let key = CompositeKey {
            key: SortKey::Text("APPLE".into()),
            position: 4,
        };
        assert_eq!(key.to_string(), "APPLE-----4");
    }
}
