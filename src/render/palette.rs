//! Fixed categorical palettes. Series and slices take colors by stable index,
//! so the n-th series has the same color on every render.

const LIGHT: &[&str] = &[
    "#2f6db5", // blue
    "#e08a1e", // orange
    "#3a9a4f", // green
    "#c8423b", // red
    "#7a56b0", // violet
    "#8c5a3c", // brown
    "#d063a5", // pink
    "#6f7782", // grey
    "#a8a532", // olive
    "#2aa3b8", // cyan
];

const DARK: &[&str] = &[
    "#6fa4e8", "#f2ab52", "#6cc47e", "#ec7a72", "#a88ad8", "#c08e6c", "#ec98cb", "#a3abb5",
    "#d1ce5f", "#5fcbdc",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    colors: &'static [&'static str],
}

impl Palette {
    /// Palette for a dashboard theme name; unknown themes fall back to light.
    pub fn for_theme(theme: &str) -> Self {
        let colors = match theme.trim().to_lowercase().as_str() {
            "dark" => DARK,
            _ => LIGHT,
        };
        Self { colors }
    }

    pub fn color(&self, index: usize) -> &'static str {
        self.colors[index % self.colors.len()]
    }

    pub fn take(&self, n: usize) -> Vec<String> {
        (0..n).map(|i| self.color(i).to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self { colors: LIGHT }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_index() {
        let p = Palette::for_theme("light");
        assert_eq!(p.color(0), p.color(p.len()));
        assert_ne!(p.color(0), p.color(1));
    }

    #[test]
    fn test_theme_selection() {
        assert_eq!(Palette::for_theme("DARK").color(0), "#6fa4e8");
        assert_eq!(Palette::for_theme("sepia"), Palette::default());
    }
}
