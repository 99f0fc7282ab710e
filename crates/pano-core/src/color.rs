//! CSS color strings → packed RGB + opacity, the form render backends take.

/// Packed `0xRRGGBB` color with a separate opacity in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub color: u32,
    pub opacity: f32,
}

impl Rgba {
    pub const WHITE: Self = Self {
        color: 0xff_ff_ff,
        opacity: 1.0,
    };
}

/// Border and fill colors of a zone mark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneColors {
    pub border: Rgba,
    pub fill: Rgba,
}

impl ZoneColors {
    pub fn decode(border: &str, fill: &str) -> Self {
        Self {
            border: decode_color(border),
            fill: decode_color(fill),
        }
    }
}

/// Decode `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)` or `rgba(..)`.
///
/// Anything unrecognised decodes to opaque white so a bad config never
/// blanks a mark out.
pub fn decode_color(css: &str) -> Rgba {
    let css = css.trim();
    if let Some(hex) = css.strip_prefix('#') {
        return decode_hex(hex).unwrap_or(Rgba::WHITE);
    }
    decode_rgb_fn(css).unwrap_or(Rgba::WHITE)
}

fn decode_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex.to_string(),
        _ => return None,
    };
    let color = u32::from_str_radix(&expanded[..6], 16).ok()?;
    let alpha = match expanded.get(6..8) {
        Some(a) => u8::from_str_radix(a, 16).ok()?,
        None => 0xff,
    };
    Some(Rgba {
        color,
        opacity: f32::from(alpha) / 255.0,
    })
}

fn decode_rgb_fn(css: &str) -> Option<Rgba> {
    let lower = css.to_ascii_lowercase();
    let (body, has_alpha) = if let Some(rest) = lower.strip_prefix("rgba(") {
        (rest, true)
    } else if let Some(rest) = lower.strip_prefix("rgb(") {
        (rest, false)
    } else {
        return None;
    };
    let body = body.strip_suffix(')')?;
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if has_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }
    let mut channels = [0u32; 3];
    for (slot, part) in channels.iter_mut().zip(&parts) {
        let v: u32 = part.parse().ok()?;
        if v > 255 {
            return None;
        }
        *slot = v;
    }
    let opacity = if has_alpha {
        let a: f32 = parts[3].parse().ok()?;
        if !(0.0..=1.0).contains(&a) {
            return None;
        }
        a
    } else {
        1.0
    };
    Some(Rgba {
        color: (channels[0] << 16) | (channels[1] << 8) | channels[2],
        opacity,
    })
}
