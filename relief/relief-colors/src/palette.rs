//! Filament color-name to hex mapping.

use tracing::warn;

/// Known filament color names, normalized to lowercase without brand or
/// finish prefixes. Ordered roughly by vendor catalog.
const COLOR_MAP: &[(&str, &str)] = &[
    // Basic colors
    ("black", "#000000"),
    ("white", "#FFFFFF"),
    ("red", "#FF0000"),
    ("green", "#00FF00"),
    ("blue", "#0000FF"),
    ("yellow", "#FFFF00"),
    ("orange", "#FFA500"),
    ("purple", "#800080"),
    ("pink", "#FFC0CB"),
    ("brown", "#8B4513"),
    ("gray", "#808080"),
    ("grey", "#808080"),
    // Bambu Lab PLA Basic
    ("jade white", "#F0FFF0"),
    ("silver", "#C0C0C0"),
    ("light gray", "#D3D3D3"),
    ("dark gray", "#696969"),
    ("hot pink", "#FF69B4"),
    ("maroon red", "#800000"),
    ("beige", "#F5F5DC"),
    ("sunflower yellow", "#FFDA03"),
    ("gold", "#FFD700"),
    ("pumpkin orange", "#FF7518"),
    ("bambu green", "#00A86B"),
    ("mistletoe green", "#50C878"),
    ("bright green", "#66FF00"),
    ("blue grey", "#6699CC"),
    ("cobalt blue", "#0047AB"),
    ("turquoise", "#40E0D0"),
    ("indigo purple", "#4B0082"),
    ("bronze", "#CD7F32"),
    ("cocoa brown", "#D2691E"),
    // Bambu Lab PLA Matte (finish prefix is stripped before lookup)
    ("ivory white", "#FFFFF0"),
    ("ash gray", "#B2BEB5"),
    ("charcoal", "#36454F"),
    ("bone white", "#F9F6EE"),
    ("nardo gray", "#7A7D7A"),
    ("lemon yellow", "#FFF700"),
    ("desert tan", "#C19A6B"),
    ("mandarin orange", "#FF8C00"),
    ("scarlet red", "#FF2400"),
    ("dark red", "#8B0000"),
    ("terracotta", "#CC4125"),
    ("sakura pink", "#FFB7C5"),
    ("plum", "#DDA0DD"),
    ("lilac purple", "#C8A2C8"),
    ("lilac", "#C8A2C8"),
    ("grass green", "#7CFC00"),
    ("apple green", "#8DB600"),
    ("dark green", "#013220"),
    ("ice blue", "#99FFFF"),
    ("sky blue", "#87CEEB"),
    ("marine blue", "#0080FF"),
    ("dark blue", "#00008B"),
    ("latte brown", "#B5651D"),
    ("dark brown", "#654321"),
    ("dark chocolate", "#3B2F2F"),
    ("caramel", "#FFD59A"),
    // Common filament colors
    ("transparent", "#FFFFFF80"),
    ("clear", "#FFFFFF80"),
    ("cyan", "#00FFFF"),
    ("magenta", "#FF00FF"),
    ("lime", "#00FF00"),
    ("navy", "#000080"),
    ("teal", "#008080"),
    ("maroon", "#800000"),
    ("olive", "#808000"),
    ("basic black", "#000000"),
    ("basic white", "#FFFFFF"),
];

/// Single-keyword fallbacks for names outside the catalog ("Galaxy Blue"
/// still maps to blue).
const KEYWORD_FALLBACKS: &[(&str, &str)] = &[
    ("red", "#FF0000"),
    ("blue", "#0000FF"),
    ("green", "#00FF00"),
    ("yellow", "#FFFF00"),
    ("orange", "#FFA500"),
    ("purple", "#800080"),
    ("pink", "#FFC0CB"),
    ("brown", "#8B4513"),
    ("white", "#FFFFFF"),
    ("black", "#000000"),
    ("gray", "#808080"),
    ("grey", "#808080"),
    ("gold", "#FFD700"),
    ("silver", "#C0C0C0"),
    ("bronze", "#CD7F32"),
    ("cyan", "#00FFFF"),
    ("magenta", "#FF00FF"),
    ("teal", "#008080"),
    ("navy", "#000080"),
    ("maroon", "#800000"),
    ("olive", "#808000"),
    ("turquoise", "#40E0D0"),
    ("violet", "#8A2BE2"),
    ("lime", "#00FF00"),
    ("beige", "#F5F5DC"),
    ("tan", "#D2B48C"),
];

/// Material, brand and finish prefixes stripped before lookup.
const STRIP_PREFIXES: &[&str] = &[
    "pla", "abs", "petg", "tpu", "bambulab", "bambu lab", "prusament", "hatchbox", "esun",
    "basic", "matte", "glossy", "silk", "metallic",
];

/// Normalize a filament name: lowercase, brand/material/finish prefixes
/// removed ("PLA BambuLab Basic Cobalt Blue" becomes "cobalt blue").
fn normalize(name: &str) -> String {
    let mut rest = name.trim().to_lowercase();
    loop {
        let mut stripped = false;
        for prefix in STRIP_PREFIXES {
            if let Some(tail) = rest.strip_prefix(prefix) {
                if let Some(tail) = tail.strip_prefix(' ') {
                    rest = tail.trim_start().to_string();
                    stripped = true;
                    break;
                }
            }
        }
        if !stripped {
            return rest;
        }
    }
}

/// Map a filament color name to a hex code.
///
/// Lookup order: exact catalog match, substring match in either
/// direction, single-keyword fallback, then gray. The last two log a
/// warning so surprising results are traceable.
#[must_use]
pub fn color_name_to_hex(name: &str) -> String {
    let normalized = normalize(name);

    for (key, hex) in COLOR_MAP {
        if *key == normalized {
            return (*hex).to_string();
        }
    }
    for (key, hex) in COLOR_MAP {
        if normalized.contains(key) || key.contains(normalized.as_str()) {
            return (*hex).to_string();
        }
    }
    for (keyword, hex) in KEYWORD_FALLBACKS {
        if normalized.contains(keyword) {
            warn!(name, keyword, "unrecognized filament color, using generic shade");
            return (*hex).to_string();
        }
    }

    warn!(name, "could not map filament color, using gray");
    "#808080".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_brand_and_finish_prefixes() {
        assert_eq!(normalize("PLA BambuLab Basic Cobalt Blue"), "cobalt blue");
        assert_eq!(normalize("PLA BambuLab Matte Ivory White"), "ivory white");
        assert_eq!(normalize("Black"), "black");
    }

    #[test]
    fn exact_catalog_match() {
        assert_eq!(color_name_to_hex("Cobalt Blue"), "#0047AB");
        assert_eq!(color_name_to_hex("PLA BambuLab Basic Black"), "#000000");
    }

    #[test]
    fn matte_names_resolve_without_finish_prefix() {
        assert_eq!(color_name_to_hex("Matte Nardo Gray"), "#7A7D7A");
    }

    #[test]
    fn keyword_fallback_for_fancy_names() {
        assert_eq!(color_name_to_hex("Galaxy Violet"), "#8A2BE2");
    }

    #[test]
    fn unknown_names_fall_back_to_gray() {
        assert_eq!(color_name_to_hex("Quantum Shimmer"), "#808080");
    }
}
