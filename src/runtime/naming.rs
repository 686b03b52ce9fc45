use std::path::PathBuf;

/// Reduces an image reference to something usable inside an instance name.
///
/// Local images (`/images/alpine_3.19.sif`) use their file stem, URIs
/// (`docker://alpine:3.19`) drop the scheme. Anything outside
/// `[A-Za-z0-9_]` becomes a single `-`.
pub fn image_to_instance_stem(image: &str) -> String {
    let without_scheme = image
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(image);

    let stem = if without_scheme.ends_with(".sif") || without_scheme.ends_with(".img") {
        let path = PathBuf::from(without_scheme);
        path.file_stem()
            .and_then(|name| name.to_str())
            .map(|s| s.to_string())
            .unwrap_or_default()
    } else {
        without_scheme.to_string()
    };

    let sanitized = sanitize_instance_name(&stem);
    if sanitized.is_empty() {
        "image".to_string()
    } else {
        sanitized
    }
}

/// Builds the `<prefix>-<image stem>-<seq>` name for the `seq`-th instance of a driver.
pub fn instance_name(prefix: &str, image: &str, seq: usize) -> String {
    format!(
        "{}-{}-{}",
        sanitize_instance_name(prefix),
        image_to_instance_stem(image),
        seq
    )
}

fn sanitize_instance_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_to_instance_stem() {
        assert_eq!(image_to_instance_stem("/images/alpine.sif"), "alpine");
        assert_eq!(
            image_to_instance_stem("/images/alpine_3.19.sif"),
            "alpine_3-19"
        );
        assert_eq!(image_to_instance_stem("docker://alpine:3.19"), "alpine-3-19");
        assert_eq!(
            image_to_instance_stem("library://sylabs/default/alpine"),
            "sylabs-default-alpine"
        );
        assert_eq!(image_to_instance_stem("docker://..."), "image");
    }

    #[test]
    fn test_instance_name() {
        assert_eq!(
            instance_name("cst", "/images/alpine.sif", 0),
            "cst-alpine-0"
        );
        assert_eq!(
            instance_name("structure test", "docker://ubuntu:22.04", 3),
            "structure-test-ubuntu-22-04-3"
        );
    }
}
