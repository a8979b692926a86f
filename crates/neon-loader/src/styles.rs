//! Stylesheet injected once into the document head.

use crate::config::LoaderConfig;

/// Id of the injected `<style>` element, used to keep injection idempotent.
pub const STYLE_BLOCK_ID: &str = "lazy-loader-styles";

/// Visual states for deferred media: blurred placeholder, fade-in, error.
pub fn render(config: &LoaderConfig) -> String {
    let m = &config.markers;
    let c = &config.classes;
    let fade = config.fade_ms;
    format!(
        r#"
img[{src}], img[{srcset}] {{
  filter: blur(5px);
  transition: filter {fade}ms ease, opacity {fade}ms ease;
}}
img.{loading} {{
  opacity: 0.6;
}}
img.{loaded} {{
  filter: none;
}}
img.{error} {{
  filter: none;
  opacity: 0.5;
  outline: 1px dashed #c0392b;
  background: #fbeaea;
}}
[{chart}].{loading}, {carousel}.{loading} {{
  min-height: 200px;
}}
"#,
        src = m.pending_src,
        srcset = m.pending_srcset,
        chart = m.chart_attr,
        carousel = m.carousel_selector,
        loading = c.loading,
        loaded = c.loaded,
        error = c.error,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_uses_configured_names() {
        let mut config = LoaderConfig::default();
        config.classes.error = "lazy-failed".to_string();
        config.fade_ms = 450;

        let css = render(&config);
        assert!(css.contains("img[data-src], img[data-srcset]"));
        assert!(css.contains("img.lazy-failed"));
        assert!(css.contains("opacity 450ms"));
        assert!(css.contains("[data-lazy-chart].loading, .carousel.loading"));
    }
}
