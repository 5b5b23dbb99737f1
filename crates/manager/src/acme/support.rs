//! Platform version gate

use std::cmp::Ordering;

use certkeep_config::MIN_PLATFORM_VERSION;

fn components(version: &str) -> Vec<u64> {
    version
        .trim()
        .split(['.', '-'])
        .map_while(|part| part.parse().ok())
        .collect()
}

/// Compare dotted numeric versions; missing components count as zero
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (components(a), components(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            a.get(i)
                .copied()
                .unwrap_or_default()
                .cmp(&b.get(i).copied().unwrap_or_default())
        })
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Whether certificates can be managed on platform `version`
pub fn platform_supported(version: &str) -> bool {
    !components(version).is_empty()
        && compare_versions(version, MIN_PLATFORM_VERSION) != Ordering::Less
}
