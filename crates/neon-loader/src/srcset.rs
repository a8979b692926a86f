//! Parsing of `srcset` URL-set values.

/// One entry of a URL-set: the URL plus its optional descriptor (`2x`, `640w`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub descriptor: Option<String>,
}

/// Split a `srcset` value into candidates, skipping empty entries.
pub fn parse(srcset: &str) -> Vec<Candidate> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?.to_string();
            let descriptor = parts.next().map(str::to_string);
            Some(Candidate { url, descriptor })
        })
        .collect()
}

/// URL fetched to validate a URL-set before it is applied.
pub fn primary_url(srcset: &str) -> Option<String> {
    parse(srcset).into_iter().next().map(|c| c.url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candidates() {
        let c = parse("/img/a.webp 1x, /img/a@2x.webp 2x");
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].url, "/img/a.webp");
        assert_eq!(c[0].descriptor.as_deref(), Some("1x"));
        assert_eq!(c[1].url, "/img/a@2x.webp");
    }

    #[test]
    fn test_parse_without_descriptor() {
        let c = parse(" /img/only.jpg ");
        assert_eq!(c, vec![Candidate { url: "/img/only.jpg".into(), descriptor: None }]);
    }

    #[test]
    fn test_empty() {
        assert!(parse("  ,  ").is_empty());
        assert_eq!(primary_url(""), None);
    }
}
