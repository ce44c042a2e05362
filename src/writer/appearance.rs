//! Widget appearance streams.
//!
//! Each appearance is a Form XObject sized to the widget rectangle. Text
//! values use Helvetica (`/Helv`), check marks use ZapfDingbats (`/ZaDb`),
//! matching the AcroForm default resources.

use crate::object::{Dict, Object};

/// Generator for widget appearance streams.
#[derive(Debug, Clone)]
pub struct AppearanceGenerator {
    width: f64,
    height: f64,
    border: bool,
}

impl AppearanceGenerator {
    /// Appearances for a widget with rectangle `[llx lly urx ury]`.
    pub fn for_rect(rect: [f64; 4]) -> Self {
        Self {
            width: (rect[2] - rect[0]).abs(),
            height: (rect[3] - rect[1]).abs(),
            border: true,
        }
    }

    /// Skip the thin border drawn around button widgets.
    pub fn without_border(mut self) -> Self {
        self.border = false;
        self
    }

    /// Text field appearance showing `text`, wrapped in `/Tx BMC ... EMC`.
    ///
    /// `font_size` of 0 means auto-size to the widget height.
    pub fn text(&self, text: &str, font_size: f64) -> Object {
        let size = if font_size > 0.0 {
            font_size
        } else {
            (self.height * 0.7).clamp(4.0, 12.0)
        };
        let baseline = ((self.height - size) / 2.0 + size * 0.22).max(1.0);

        let mut content = String::from("/Tx BMC\nq\n");
        content.push_str(&format!("1 1 {} {} re W n\n", fmt(self.width - 2.0), fmt(self.height - 2.0)));
        if !text.is_empty() {
            content.push_str("BT\n0 g\n");
            content.push_str(&format!("/Helv {} Tf\n", fmt(size)));
            content.push_str(&format!("2 {} Td\n", fmt(baseline)));
            content.push_str(&format!("({}) Tj\n", escape_win_ansi(text)));
            content.push_str("ET\n");
        }
        content.push_str("Q\nEMC");

        self.form_xobject(content, "Helv", "Helvetica")
    }

    /// Checked box: ZapfDingbats check mark (glyph `4`).
    pub fn checkbox_on(&self) -> Object {
        self.dingbat('4', 0.8)
    }

    /// Selected radio button: ZapfDingbats filled circle (glyph `l`).
    pub fn radio_on(&self) -> Object {
        self.dingbat('l', 0.6)
    }

    /// Off state for either button kind.
    pub fn button_off(&self) -> Object {
        let content = self.border_ops();
        self.form_xobject(content, "ZaDb", "ZapfDingbats")
    }

    fn dingbat(&self, glyph: char, scale: f64) -> Object {
        let size = self.width.min(self.height) * scale;
        // ZapfDingbats glyphs are roughly 0.75em wide and sit on the baseline
        let x = (self.width - size * 0.75) / 2.0;
        let y = (self.height - size * 0.7) / 2.0;

        let mut content = self.border_ops();
        content.push_str(&format!(
            "q\n0 g\nBT\n/ZaDb {} Tf\n{} {} Td\n({}) Tj\nET\nQ",
            fmt(size),
            fmt(x),
            fmt(y),
            glyph
        ));
        self.form_xobject(content, "ZaDb", "ZapfDingbats")
    }

    fn border_ops(&self) -> String {
        if !self.border {
            return String::new();
        }
        format!(
            "0 G\n1 w\n0.5 0.5 {} {} re S\n",
            fmt(self.width - 1.0),
            fmt(self.height - 1.0)
        )
    }

    fn form_xobject(&self, content: String, font_key: &str, base_font: &str) -> Object {
        let mut font = Dict::new();
        font.insert("Type".to_string(), Object::name("Font"));
        font.insert("Subtype".to_string(), Object::name("Type1"));
        font.insert("BaseFont".to_string(), Object::name(base_font));
        if base_font == "Helvetica" {
            font.insert("Encoding".to_string(), Object::name("WinAnsiEncoding"));
        }

        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("XObject"));
        dict.insert("Subtype".to_string(), Object::name("Form"));
        dict.insert("BBox".to_string(), Object::rect(0.0, 0.0, self.width, self.height));
        dict.insert(
            "Resources".to_string(),
            Object::dict([("Font", Object::dict([(font_key, Object::Dictionary(font))]))]),
        );

        Object::Stream {
            dict,
            data: bytes::Bytes::from(content.into_bytes()),
        }
    }
}

/// Font size from a default appearance string such as `/Helv 10 Tf 0 g`.
pub fn font_size_from_da(da: &str) -> Option<f64> {
    let tokens: Vec<&str> = da.split_whitespace().collect();
    tokens
        .iter()
        .position(|t| *t == "Tf")
        .filter(|&i| i >= 1)
        .and_then(|i| tokens[i - 1].parse().ok())
}

/// Escape a string for a literal in a WinAnsi-encoded content stream.
///
/// Characters outside Latin-1 have no glyph in the standard encoding and
/// are shown as `?`.
fn escape_win_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '(' => result.push_str("\\("),
            ')' => result.push_str("\\)"),
            '\r' | '\n' => result.push(' '),
            c if c.is_ascii() && !c.is_ascii_control() => result.push(c),
            c if (0xA0..=0xFF).contains(&(c as u32)) => {
                result.push_str(&format!("\\{:03o}", c as u32));
            },
            _ => result.push('?'),
        }
    }
    result
}

fn fmt(v: f64) -> String {
    let formatted = format!("{:.2}", v);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(obj: &Object) -> String {
        match obj {
            Object::Stream { data, .. } => String::from_utf8_lossy(data).to_string(),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_escape_win_ansi() {
        assert_eq!(escape_win_ansi("Hello (World)"), "Hello \\(World\\)");
        assert_eq!(escape_win_ansi("Back\\slash"), "Back\\\\slash");
        assert_eq!(escape_win_ansi("Zoë"), "Zo\\353");
        assert_eq!(escape_win_ansi("名"), "?");
    }

    #[test]
    fn test_text_appearance() {
        let gen = AppearanceGenerator::for_rect([72.0, 700.0, 272.0, 720.0]);
        let ap = gen.text("Alice", 10.0);
        let text = content(&ap);
        assert!(text.starts_with("/Tx BMC"));
        assert!(text.contains("/Helv 10 Tf"));
        assert!(text.contains("(Alice) Tj"));
        assert!(text.ends_with("EMC"));

        let dict = ap.as_dict().unwrap();
        assert_eq!(dict["Subtype"].as_name(), Some("Form"));
        assert_eq!(dict["BBox"], Object::rect(0.0, 0.0, 200.0, 20.0));
    }

    #[test]
    fn test_auto_font_size() {
        let gen = AppearanceGenerator::for_rect([0.0, 0.0, 100.0, 10.0]);
        assert!(content(&gen.text("x", 0.0)).contains("/Helv 7 Tf"));
    }

    #[test]
    fn test_button_states() {
        let gen = AppearanceGenerator::for_rect([0.0, 0.0, 12.0, 12.0]);
        assert!(content(&gen.checkbox_on()).contains("(4) Tj"));
        assert!(content(&gen.radio_on()).contains("(l) Tj"));
        assert!(!content(&gen.button_off()).contains("Tj"));
        assert!(content(&gen.without_border().button_off()).is_empty());
    }

    #[test]
    fn test_font_size_from_da() {
        assert_eq!(font_size_from_da("/Helv 10 Tf 0 g"), Some(10.0));
        assert_eq!(font_size_from_da("0 g /Helv 0 Tf"), Some(0.0));
        assert_eq!(font_size_from_da("0 g"), None);
    }
}
