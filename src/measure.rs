use unicode_width::UnicodeWidthStr;

use crate::schema::Table;

#[derive(Debug, Clone)]
pub struct TextMetrics {
    pub char_width: f64,
    pub line_height: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub header_padding: f64,
    pub min_card_width: f64,
    pub collapsed_height: f64,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
            padding_x: 12.0,
            padding_y: 8.0,
            header_padding: 4.0,
            min_card_width: 160.0,
            collapsed_height: 36.0,
        }
    }
}

impl TextMetrics {
    pub fn text_width(&self, text: &str) -> f64 {
        let width = UnicodeWidthStr::width(text);
        width as f64 * self.char_width
    }

    pub fn header_height(&self) -> f64 {
        self.line_height + self.header_padding * 2.0
    }

    /// Size of a table card. Collapsed cards keep their width but shrink to a
    /// fixed compact height.
    pub fn card_size(&self, table: &Table, collapsed: bool) -> (f64, f64) {
        let header_width = self.text_width(&table.name);

        let max_col_width = table
            .columns
            .iter()
            .map(|c| self.text_width(&c.name) + self.text_width(&c.typ) + self.char_width * 3.0)
            .fold(0.0, f64::max);

        let content_width = header_width.max(max_col_width) + self.padding_x * 2.0;
        let width = content_width.max(self.min_card_width);

        if collapsed {
            return (width, self.collapsed_height);
        }

        let body_height = if table.columns.is_empty() {
            0.0
        } else {
            table.columns.len() as f64 * self.line_height + self.padding_y * 2.0
        };

        (width, self.header_height() + body_height)
    }

    /// Vertical center of the `row`th column, relative to the card top.
    pub fn row_center(&self, row: usize) -> f64 {
        self.header_height() + self.padding_y + self.line_height * (row as f64 + 0.5)
    }

    /// Vertical center of the header, relative to the card top.
    pub fn header_center(&self, collapsed: bool) -> f64 {
        if collapsed {
            self.collapsed_height / 2.0
        } else {
            self.header_height() / 2.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;

    #[test]
    fn test_ascii_width() {
        let m = TextMetrics::default();
        assert_eq!(m.text_width("User"), 4.0 * 8.0);
    }

    #[test]
    fn test_unicode_width() {
        let m = TextMetrics::default();
        // full-width characters count double
        assert_eq!(m.text_width("ユーザー"), 8.0 * 8.0);
    }

    #[test]
    fn test_card_size_no_columns() {
        let m = TextMetrics::default();
        let (w, h) = m.card_size(&Table::new("users", vec![]), false);
        assert_eq!(w, m.min_card_width);
        assert_eq!(h, m.header_height());
    }

    #[test]
    fn test_collapsed_card_is_compact() {
        let m = TextMetrics::default();
        let table = Table::new(
            "orders",
            vec![Column::new("id", "int"), Column::new("amount", "numeric")],
        );
        let (w_open, h_open) = m.card_size(&table, false);
        let (w_closed, h_closed) = m.card_size(&table, true);
        assert_eq!(w_open, w_closed);
        assert!(h_open > h_closed);
        assert_eq!(h_closed, m.collapsed_height);
    }

    #[test]
    fn test_row_centers_increase() {
        let m = TextMetrics::default();
        assert!(m.row_center(0) > m.header_height());
        assert_eq!(m.row_center(1) - m.row_center(0), m.line_height);
    }
}
