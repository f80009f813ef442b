/// 8-bit straight-alpha RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Tag-color table for inline text markup and named schema colors.
///
/// Lookups are case-insensitive; names outside this table fall back to the
/// caller's default.
const NAMED_COLORS: &[(&str, Color)] = &[
    ("white", Color::rgb(255, 255, 255)),
    ("black", Color::rgb(0, 0, 0)),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 255, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("orange", Color::rgb(255, 165, 0)),
    ("purple", Color::rgb(128, 0, 128)),
    ("pink", Color::rgb(255, 192, 203)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("gray", Color::rgb(128, 128, 128)),
    ("grey", Color::rgb(128, 128, 128)),
];

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        NAMED_COLORS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
    }

    /// `0xRRGGBB` form consumed by ffmpeg filter arguments.
    pub fn hex_rgb(&self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Per-channel linear interpolation toward `end` at `t` in `[0, 1]`.
    pub fn lerp(self, end: Color, t: f64) -> Color {
        let mix = |a: u8, b: u8| -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8
        };
        Color {
            r: mix(self.r, end.r),
            g: mix(self.g, end.g),
            b: mix(self.b, end.b),
            a: mix(self.a, end.a),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl serde::Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        };
        serializer.serialize_str(&s)
    }
}

impl<'de> serde::Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Arr(Vec<u8>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => {
                let t = s.trim();
                if t.starts_with('#') {
                    parse_hex(t).map_err(serde::de::Error::custom)
                } else {
                    Color::from_name(t).ok_or_else(|| {
                        serde::de::Error::custom(format!("unknown color name \"{t}\""))
                    })
                }
            }
            Repr::Arr(v) => match v.len() {
                3 => Ok(Color::rgb(v[0], v[1], v[2])),
                4 => Ok(Color::rgba(v[0], v[1], v[2], v[3])),
                _ => Err(serde::de::Error::custom(
                    "color array must have len 3 ([r,g,b]) or 4 ([r,g,b,a])",
                )),
            },
        }
    }
}

fn parse_hex(s: &str) -> Result<Color, String> {
    let s = s.strip_prefix('#').unwrap_or(s);

    fn hex_byte(pair: &str) -> Result<u8, String> {
        u8::from_str_radix(pair, 16).map_err(|_| format!("invalid hex byte \"{pair}\""))
    }

    match s.len() {
        6 => Ok(Color::rgb(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
        )),
        8 => Ok(Color::rgba(
            hex_byte(&s[0..2])?,
            hex_byte(&s[2..4])?,
            hex_byte(&s[4..6])?,
            hex_byte(&s[6..8])?,
        )),
        _ => Err("hex color must be #RRGGBB or #RRGGBBAA (case-insensitive)".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_hex_rgb_and_rgba() {
        let c: Color = serde_json::from_value(json!("#ff0000")).unwrap();
        assert_eq!(c, Color::rgb(255, 0, 0));

        let c: Color = serde_json::from_value(json!("#0000FF80")).unwrap();
        assert_eq!(c, Color::rgba(0, 0, 255, 128));
    }

    #[test]
    fn parses_names_case_insensitively() {
        let c: Color = serde_json::from_value(json!("Orange")).unwrap();
        assert_eq!(c, Color::rgb(255, 165, 0));
        assert_eq!(Color::from_name(" GREY "), Some(Color::rgb(128, 128, 128)));
        assert_eq!(Color::from_name("mauve"), None);
    }

    #[test]
    fn parses_arrays() {
        let c: Color = serde_json::from_value(json!([10, 20, 30])).unwrap();
        assert_eq!(c, Color::rgb(10, 20, 30));

        let c: Color = serde_json::from_value(json!([10, 20, 30, 40])).unwrap();
        assert_eq!(c, Color::rgba(10, 20, 30, 40));

        assert!(serde_json::from_value::<Color>(json!([1, 2])).is_err());
    }

    #[test]
    fn rejects_unknown_names() {
        assert!(serde_json::from_value::<Color>(json!("not-a-color")).is_err());
    }

    #[test]
    fn serializes_as_hex() {
        assert_eq!(
            serde_json::to_string(&Color::rgb(255, 0, 0)).unwrap(),
            "\"#ff0000\""
        );
        assert_eq!(
            serde_json::to_string(&Color::rgba(0, 0, 255, 128)).unwrap(),
            "\"#0000ff80\""
        );
    }

    #[test]
    fn emits_ffmpeg_hex() {
        assert_eq!(Color::rgb(255, 165, 0).hex_rgb(), "0xFFA500");
    }

    #[test]
    fn lerp_hits_endpoints_and_midpoint() {
        let a = Color::rgb(0, 0, 0);
        let b = Color::rgb(255, 0, 100);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 0.5), Color::rgb(128, 0, 50));
    }
}
