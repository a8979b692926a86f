//! Placeholder synthesis for images that have not been requested yet.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Neutral box with a label, sized from the element's declared dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    pub width: u32,
    pub height: u32,
}

impl Placeholder {
    /// Size from declared `width`/`height` attribute values, falling back
    /// to the defaults for anything missing or unparsable.
    pub fn from_declared(
        width: Option<&str>,
        height: Option<&str>,
        default_width: u32,
        default_height: u32,
    ) -> Self {
        Self {
            width: parse_dimension(width).unwrap_or(default_width),
            height: parse_dimension(height).unwrap_or(default_height),
        }
    }

    /// SVG markup for the placeholder.
    pub fn to_svg(&self) -> String {
        self.labeled_svg("Loading...", "#f0f0f0", "#999")
    }

    fn labeled_svg(&self, label: &str, fill: &str, ink: &str) -> String {
        let (w, h) = (self.width, self.height);
        let font = (w.min(h) / 10).clamp(10, 24);
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\
<rect width=\"100%\" height=\"100%\" fill=\"{fill}\"/>\
<text x=\"50%\" y=\"50%\" font-family=\"Arial, sans-serif\" font-size=\"{font}\" fill=\"{ink}\" \
text-anchor=\"middle\" dominant-baseline=\"middle\">{label}</text></svg>"
        )
    }

    /// `data:` URI suitable for an image `src` attribute.
    pub fn to_data_uri(&self) -> String {
        svg_data_uri(&self.to_svg())
    }

    /// Same box, labeled as unavailable. Shown when the real resource fails.
    pub fn to_error_data_uri(&self) -> String {
        svg_data_uri(&self.labeled_svg("Image unavailable", "#fbeaea", "#c0392b"))
    }
}

fn svg_data_uri(svg: &str) -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

fn parse_dimension(value: Option<&str>) -> Option<u32> {
    let v = value?.trim().trim_end_matches("px");
    let parsed = v.parse::<f64>().ok()?;
    if parsed.is_finite() && parsed >= 1.0 {
        Some(parsed.round() as u32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_undeclared() {
        let p = Placeholder::from_declared(None, None, 300, 200);
        assert_eq!(p, Placeholder { width: 300, height: 200 });
    }

    #[test]
    fn test_declared_dimensions() {
        let p = Placeholder::from_declared(Some("640"), Some("480px"), 300, 200);
        assert_eq!(p, Placeholder { width: 640, height: 480 });

        let p = Placeholder::from_declared(Some("auto"), Some("0"), 300, 200);
        assert_eq!(p, Placeholder { width: 300, height: 200 });
    }

    #[test]
    fn test_data_uri_round_trips_svg() {
        let p = Placeholder { width: 300, height: 200 };
        let uri = p.to_data_uri();
        let encoded = uri.strip_prefix("data:image/svg+xml;base64,").unwrap();
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("width=\"300\""));
        assert!(svg.contains("height=\"200\""));
        assert!(svg.contains("Loading..."));
    }

    #[test]
    fn test_error_variant_differs() {
        let p = Placeholder { width: 64, height: 64 };
        assert_ne!(p.to_data_uri(), p.to_error_data_uri());
        let encoded = p
            .to_error_data_uri()
            .strip_prefix("data:image/svg+xml;base64,")
            .map(str::to_string)
            .unwrap();
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("Image unavailable"));
    }
}
