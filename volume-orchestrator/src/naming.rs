/// Maximum length an array object name may have. Names longer than this are
/// truncated and disambiguated with a short hash suffix so that two
/// different long names never canonicalize to the same array name.
const MAX_NAME_LEN: usize = 31;

/// Deterministic name-canonicalization transform (spec §4.E.1 step 1:
/// "Canonicalize `name` via a deterministic transform (lun-prefix or
/// fs-prefix + truncation rule)"). The exact transform is treated as a
/// pluggable, externalization-stable rule; this is one concrete instance of
/// it, not a claim about the source's literal prefix strings.
pub fn canonicalize(prefix: &str, raw_name: &str) -> String {
    let candidate = format!("{prefix}{raw_name}");
    if candidate.len() <= MAX_NAME_LEN {
        return candidate;
    }
    let hash = short_hash(raw_name);
    let budget = MAX_NAME_LEN - hash.len() - 1;
    let mut truncated = candidate;
    truncated.truncate(budget);
    format!("{truncated}-{hash}")
}

/// An 8-hex-digit fingerprint, stable across runs, used only to disambiguate
/// truncated names — not a security-sensitive hash.
fn short_hash(input: &str) -> String {
    let mut hash: u32 = 2166136261; // FNV-1a offset basis
    for byte in input.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    format!("{hash:08x}")
}

pub const LUN_PREFIX: &str = "lun-";
pub const FS_PREFIX: &str = "fs-";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_just_get_prefixed() {
        assert_eq!(canonicalize(LUN_PREFIX, "pvc-a"), "lun-pvc-a");
    }

    #[test]
    fn long_names_are_truncated_deterministically() {
        let long = "pvc-".to_string() + &"x".repeat(60);
        let a = canonicalize(LUN_PREFIX, &long);
        let b = canonicalize(LUN_PREFIX, &long);
        assert_eq!(a, b);
        assert!(a.len() <= MAX_NAME_LEN);
    }

    #[test]
    fn distinct_long_names_do_not_collide() {
        let a = canonicalize(LUN_PREFIX, &("x".repeat(60)));
        let b = canonicalize(LUN_PREFIX, &("y".repeat(60)));
        assert_ne!(a, b);
    }
}
