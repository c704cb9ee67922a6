use std::fmt;

pub const GLYPH_ASCENDING: &str = "↑";
pub const GLYPH_DESCENDING: &str = "↓";
pub const GLYPH_UNSORTED: &str = "↕";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Marker of a sortable header. Holds the direction that was applied last.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Indicator {
    applied: Option<Direction>,
}

impl Indicator {
    pub fn glyph(&self) -> &'static str {
        match self.applied {
            Some(Direction::Ascending) => GLYPH_ASCENDING,
            Some(Direction::Descending) => GLYPH_DESCENDING,
            None => GLYPH_UNSORTED,
        }
    }

    // Only an up arrow flips the next sort to descending.
    pub fn next_direction(&self) -> Direction {
        if self.glyph() == GLYPH_ASCENDING {
            Direction::Descending
        } else {
            Direction::Ascending
        }
    }

    pub fn set(&mut self, direction: Direction) {
        self.applied = Some(direction);
    }

    pub fn reset(&mut self) {
        self.applied = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub label: String,
    pub indicator: Option<Indicator>,
}

impl Header {
    pub fn sortable(label: impl Into<String>) -> Self {
        Header {
            label: label.into(),
            indicator: Some(Indicator::default()),
        }
    }

    pub fn inert(label: impl Into<String>) -> Self {
        Header {
            label: label.into(),
            indicator: None,
        }
    }

    pub fn is_sortable(&self) -> bool {
        self.indicator.is_some()
    }

    /// Label as rendered in the table header, including the indicator glyph.
    pub fn display(&self) -> String {
        match &self.indicator {
            Some(indicator) => format!("{} {}", self.label, indicator.glyph()),
            None => self.label.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub text: String,
    pub sort_value: Option<String>,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Cell {
            text: text.into(),
            sort_value: None,
        }
    }

    pub fn with_sort_value(text: impl Into<String>, sort_value: impl Into<String>) -> Self {
        Cell {
            text: text.into(),
            sort_value: Some(sort_value.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Row { cells }
    }

    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Row {
            cells: texts.iter().map(|t| Cell::new(t.as_ref())).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<Header>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Builds a table, padding short rows with empty cells so every row spans all headers.
    pub fn new(name: impl Into<String>, headers: Vec<Header>, rows: Vec<Row>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.cells.len() < width {
                    row.cells.resize_with(width, Cell::default);
                }
                row
            })
            .collect();
        Table {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.cells.get(column))
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.label == label)
    }

    /// Display widths per column, header glyph included.
    pub fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(cidx, header)| {
                self.rows
                    .iter()
                    .filter_map(|r| r.cells.get(cidx))
                    .map(|c| c.text.chars().count())
                    .chain(std::iter::once(header.display().chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// New table holding clones of the given rows, in the given order.
    pub fn subset(&self, indices: &[usize], name: impl Into<String>) -> Table {
        let rows = indices
            .iter()
            .filter_map(|&idx| self.rows.get(idx).cloned())
            .collect();
        Table {
            name: name.into(),
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Tab separated rendering used for the clipboard and headless output.
    ///
    /// Spaces used as digit group separators are removed and indicator glyphs
    /// never appear, so the result pastes cleanly into a spreadsheet.
    pub fn to_tsv(&self) -> String {
        let mut out = String::new();
        let header = self
            .headers
            .iter()
            .map(|h| strip_glyphs(&h.label))
            .collect::<Vec<String>>()
            .join("\t");
        out.push_str(&header);
        out.push('\n');
        for row in self.rows.iter() {
            let line = row
                .cells
                .iter()
                .map(|c| collapse_digit_spaces(&strip_glyphs(&c.text)))
                .collect::<Vec<String>>()
                .join("\t");
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\"{}\" {} columns, {} rows",
            self.name,
            self.column_count(),
            self.row_count()
        )
    }
}

fn strip_glyphs(s: &str) -> String {
    s.replace(GLYPH_ASCENDING, "")
        .replace(GLYPH_DESCENDING, "")
        .replace(GLYPH_UNSORTED, "")
}

// "1 234 567" -> "1234567", "a 1" stays untouched.
fn collapse_digit_spaces(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() && i > 0 && chars[i - 1].is_ascii_digit() {
            let mut j = i;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && chars[j].is_ascii_digit() {
                i = j;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_toggles_on_up_arrow_only() {
        let mut indicator = Indicator::default();
        assert_eq!(indicator.glyph(), GLYPH_UNSORTED);
        assert_eq!(indicator.next_direction(), Direction::Ascending);

        indicator.set(Direction::Ascending);
        assert_eq!(indicator.glyph(), GLYPH_ASCENDING);
        assert_eq!(indicator.next_direction(), Direction::Descending);

        indicator.set(Direction::Descending);
        assert_eq!(indicator.glyph(), GLYPH_DESCENDING);
        assert_eq!(indicator.next_direction(), Direction::Ascending);

        indicator.reset();
        assert_eq!(indicator, Indicator::default());
    }

    #[test]
    fn short_rows_are_padded() {
        let table = Table::new(
            "t",
            vec![Header::sortable("a"), Header::sortable("b")],
            vec![Row::from_texts(&["1"])],
        );
        assert_eq!(table.rows[0].cells.len(), 2);
        assert_eq!(table.cell(0, 1), Some(&Cell::default()));
    }

    #[test]
    fn header_display_carries_glyph() {
        assert_eq!(Header::sortable("Amount").display(), "Amount ↕");
        assert_eq!(Header::inert("Notes").display(), "Notes");
    }

    #[test]
    fn tsv_removes_digit_spaces_and_glyphs() {
        let table = Table::new(
            "budget",
            vec![Header::sortable("Project ↑"), Header::sortable("Amount")],
            vec![Row::from_texts(&["Trip to Lyon", "1 234 567,50"])],
        );
        assert_eq!(
            table.to_tsv(),
            "Project \tAmount\nTrip to Lyon\t1234567,50\n"
        );
    }

    #[test]
    fn subset_keeps_requested_order() {
        let table = Table::new(
            "t",
            vec![Header::sortable("a")],
            vec![
                Row::from_texts(&["x"]),
                Row::from_texts(&["y"]),
                Row::from_texts(&["z"]),
            ],
        );
        let sub = table.subset(&[2, 0, 7], "F[t]");
        assert_eq!(sub.name, "F[t]");
        assert_eq!(sub.rows, vec![Row::from_texts(&["z"]), Row::from_texts(&["x"])]);
    }

    #[test]
    fn column_widths_include_header() {
        let table = Table::new(
            "t",
            vec![Header::sortable("id"), Header::inert("description")],
            vec![Row::from_texts(&["12345", "x"])],
        );
        assert_eq!(table.column_widths(), vec![5, 11]);
    }
}
