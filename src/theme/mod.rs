//! Color tokens of the inventory UI.
//!
//! The same palette feeds the Tailwind `theme.extend` block and plain CSS
//! custom properties, so templates can use either `bg-primary` or
//! `var(--color-primary)`.

use std::fmt::Write as _;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use thiserror::Error;

/// Errors produced while building a [`Palette`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaletteError {
    #[error("invalid color name {name:?}: expected lowercase letters, digits and '-'")]
    InvalidName { name: String },

    #[error("invalid color {value:?} for {name:?}: expected #RRGGBB")]
    InvalidHex { name: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    name: String,
    hex: String,
}

/// Ordered set of named `#RRGGBB` colors.
///
/// # Examples
///
/// ```
/// use modal_prefetch::theme::Palette;
///
/// let palette = Palette::inventory();
/// assert_eq!(palette.get("brown-dark"), Some("#2C1810"));
/// assert!(palette.css_variables().contains("--color-primary: #8B4513;"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Palette {
    #[serde(serialize_with = "serialize_tokens")]
    colors: Vec<Token>,
}

impl Palette {
    /// An empty palette.
    pub fn new() -> Self {
        Self::default()
    }

    /// The inventory application's earthy palette.
    pub fn inventory() -> Self {
        let colors = [
            ("primary", "#8B4513"),
            ("secondary", "#6B8E23"),
            ("beige", "#F5F5DC"),
            ("brown-dark", "#2C1810"),
        ]
        .into_iter()
        .map(|(name, hex)| Token {
            name: name.to_owned(),
            hex: hex.to_owned(),
        })
        .collect();
        Self { colors }
    }

    /// Adds `name`, or replaces its value if already present.
    ///
    /// # Errors
    ///
    /// [`PaletteError::InvalidName`] for an empty name or one outside
    /// `[a-z0-9-]`; [`PaletteError::InvalidHex`] unless `hex` is `#RRGGBB`.
    pub fn with_color(
        mut self,
        name: impl Into<String>,
        hex: impl Into<String>,
    ) -> Result<Self, PaletteError> {
        let name = name.into();
        let hex = hex.into();

        if !is_token_name(&name) {
            return Err(PaletteError::InvalidName { name });
        }
        if !is_hex_color(&hex) {
            return Err(PaletteError::InvalidHex { name, value: hex });
        }

        match self.colors.iter_mut().find(|t| t.name == name) {
            Some(token) => token.hex = hex,
            None => self.colors.push(Token { name, hex }),
        }
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.colors
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.hex.as_str())
    }

    /// `(name, hex)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.colors.iter().map(|t| (t.name.as_str(), t.hex.as_str()))
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Renders a `:root` rule declaring `--color-<name>` for every token.
    pub fn css_variables(&self) -> String {
        let mut css = String::from(":root {\n");
        for (name, hex) in self.iter() {
            let _ = writeln!(css, "  --color-{name}: {hex};");
        }
        css.push_str("}\n");
        css
    }

    /// Serializes to the `{"colors": {...}}` shape of a Tailwind
    /// `theme.extend` block.
    pub fn to_tailwind_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn serialize_tokens<S: Serializer>(tokens: &[Token], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(tokens.len()))?;
    for token in tokens {
        map.serialize_entry(&token.name, &token.hex)?;
    }
    map.end()
}

fn is_token_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

fn is_hex_color(value: &str) -> bool {
    match value.strip_prefix('#') {
        Some(digits) => digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inventory_tokens() {
        let palette = Palette::inventory();
        assert_eq!(palette.len(), 4);
        assert_eq!(palette.get("primary"), Some("#8B4513"));
        assert_eq!(palette.get("secondary"), Some("#6B8E23"));
        assert_eq!(palette.get("beige"), Some("#F5F5DC"));
        assert_eq!(palette.get("brown-dark"), Some("#2C1810"));
        assert_eq!(palette.get("accent"), None);
    }

    #[test]
    fn css_variables_keep_declaration_order() {
        assert_eq!(
            Palette::inventory().css_variables(),
            ":root {\n  \
             --color-primary: #8B4513;\n  \
             --color-secondary: #6B8E23;\n  \
             --color-beige: #F5F5DC;\n  \
             --color-brown-dark: #2C1810;\n\
             }\n"
        );
        assert_eq!(Palette::new().css_variables(), ":root {\n}\n");
    }

    #[test]
    fn tailwind_shape() {
        let json = Palette::inventory().to_tailwind_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "colors": {
                    "primary": "#8B4513",
                    "secondary": "#6B8E23",
                    "beige": "#F5F5DC",
                    "brown-dark": "#2C1810",
                }
            })
        );
    }

    #[test]
    fn with_color_adds_and_replaces() {
        let palette = Palette::inventory()
            .with_color("accent", "#abcdef")
            .unwrap()
            .with_color("primary", "#000000")
            .unwrap();
        assert_eq!(palette.len(), 5);
        assert_eq!(palette.get("primary"), Some("#000000"));
        assert_eq!(palette.iter().last(), Some(("accent", "#abcdef")));
    }

    #[test]
    fn rejects_bad_hex() {
        for bad in ["8B4513", "#8B451", "#8B45130", "#GGGGGG", "#8b4 13", ""] {
            let err = Palette::new().with_color("primary", bad).unwrap_err();
            assert_eq!(
                err,
                PaletteError::InvalidHex {
                    name: "primary".into(),
                    value: bad.into()
                }
            );
        }
    }

    #[test]
    fn rejects_bad_name() {
        for bad in ["", "Primary", "brown_dark", "a b"] {
            assert!(matches!(
                Palette::new().with_color(bad, "#FFFFFF"),
                Err(PaletteError::InvalidName { .. })
            ));
        }
    }
}
