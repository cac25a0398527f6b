//! Base material types

/// Base material group
#[derive(Debug, Clone, PartialEq)]
pub struct BaseMaterialGroup {
    /// Base material group ID
    pub id: usize,
    /// List of base materials in this group
    pub materials: Vec<BaseMaterial>,
}

impl BaseMaterialGroup {
    /// Create a new base material group
    pub fn new(id: usize) -> Self {
        Self {
            id,
            materials: Vec::new(),
        }
    }
}

/// Individual base material within a base material group
#[derive(Debug, Clone, PartialEq)]
pub struct BaseMaterial {
    /// Material name
    pub name: String,
    /// Display color in RGBA format (red, green, blue, alpha)
    pub displaycolor: (u8, u8, u8, u8),
}

impl BaseMaterial {
    /// Create a new base material
    pub fn new(name: impl Into<String>, displaycolor: (u8, u8, u8, u8)) -> Self {
        Self {
            name: name.into(),
            displaycolor,
        }
    }

    /// Display colour as `#RRGGBBAA`
    pub fn displaycolor_hex(&self) -> String {
        let (r, g, b, a) = self.displaycolor;
        format!("#{:02X}{:02X}{:02X}{:02X}", r, g, b, a)
    }
}

/// Parse a `#RRGGBB` or `#RRGGBBAA` display colour
pub fn parse_displaycolor(value: &str) -> Option<(u8, u8, u8, u8)> {
    let hex = value.strip_prefix('#')?;
    if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
    Some((byte(0)?, byte(2)?, byte(4)?, alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_displaycolor_round_trip() {
        let material = BaseMaterial::new("Cyan", (0x00, 0x86, 0xD6, 0xFF));
        assert_eq!(material.displaycolor_hex(), "#0086D6FF");
        assert_eq!(
            parse_displaycolor(&material.displaycolor_hex()),
            Some(material.displaycolor)
        );
        assert_eq!(parse_displaycolor("#FF0000"), Some((255, 0, 0, 255)));
        assert_eq!(parse_displaycolor("FF0000"), None);
        assert_eq!(parse_displaycolor("#FF00"), None);
    }
}
