//! Console assets compiled into the binary

/// Embedded file: `(path, content type, body)`
const ASSETS: &[(&str, &str, &str)] = &[
    (
        "bam.css",
        "text/css; charset=utf-8",
        include_str!("../../assets/bam.css"),
    ),
    (
        "bam.js",
        "application/javascript; charset=utf-8",
        include_str!("../../assets/bam.js"),
    ),
];

/// Look up an embedded asset by its path under `/assets/`
pub fn get(path: &str) -> Option<(&'static str, &'static str)> {
    ASSETS
        .iter()
        .find(|(name, _, _)| *name == path)
        .map(|(_, content_type, body)| (*content_type, *body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get() {
        let (content_type, body) = get("bam.css").unwrap();
        assert!(content_type.starts_with("text/css"));
        assert!(body.contains("#container"));
        assert!(get("bam.js").is_some());
        assert!(get("../Cargo.toml").is_none());
    }
}
