//! Kubernetes server version gate

/// Oldest supported release is 1.17
pub const MIN_SUPPORTED_MAJOR: u32 = 1;
pub const MIN_SUPPORTED_MINOR: u32 = 17;

/// Whether a reported server version meets the supported floor.
///
/// Accepts `[v]MAJOR.MINOR[.PATCH][(+|-)SUFFIX]`, e.g. `v1.28.5+k3s1` or
/// `v1.27.9-eks-ba74326`. Anything that does not parse is unsupported.
pub fn is_version_supported(version: &str) -> bool {
    let trimmed = version.strip_prefix('v').unwrap_or(version);
    let mut parts = trimmed.split('.');

    let (Some(major), Some(minor)) = (parts.next(), parts.next()) else {
        return false;
    };

    let minor = minor
        .split(|c| c == '+' || c == '-')
        .next()
        .unwrap_or_default();

    let (Ok(major), Ok(minor)) = (major.parse::<u32>(), minor.parse::<u32>()) else {
        return false;
    };

    major > MIN_SUPPORTED_MAJOR || (major == MIN_SUPPORTED_MAJOR && minor >= MIN_SUPPORTED_MINOR)
}
