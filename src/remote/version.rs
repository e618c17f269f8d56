// src/remote/version.rs

//! Release tag version parsing

use semver::Version;

/// Extract `(major, minor, build)` from a release tag
///
/// Accepts `v1.2.3`, `1.2.3`, `release-1.2.3`, `1.2.3-beta` and shorter
/// forms such as `v2.1` (missing parts are 0). Returns `None` when the tag
/// contains no number at all.
pub fn parse_tag_version(tag: &str) -> Option<(u32, u32, u32)> {
    let start = tag.find(|c: char| c.is_ascii_digit())?;
    let rest = &tag[start..];

    if let Ok(version) = Version::parse(rest) {
        return Some((
            u32::try_from(version.major).ok()?,
            u32::try_from(version.minor).ok()?,
            u32::try_from(version.patch).ok()?,
        ));
    }

    let mut parts = rest
        .split('.')
        .take(3)
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        });

    let major = parts.next().flatten()?;
    let minor = parts.next().flatten().unwrap_or(0);
    let build = parts.next().flatten().unwrap_or(0);
    Some((major, minor, build))
}
