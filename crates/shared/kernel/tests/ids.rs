use apex_kernel::domain::ids::{CandidateId, TierId};
use apex_kernel::{SAFE_ALPHABET, new_id, safe_nanoid, slug_id};

#[test]
fn generates_expected_length_and_charset() {
    let id = safe_nanoid!();
    assert_eq!(id.len(), 12);

    for ch in id.chars() {
        assert!(SAFE_ALPHABET.contains(&ch), "unexpected character in nanoid: {ch}");
    }
}

#[test]
fn custom_length() {
    let id = safe_nanoid!(20);
    assert_eq!(id.len(), 20);
}

#[test]
fn new_id_is_prefixed_with_entity() {
    let a: CandidateId = new_id();
    let b: CandidateId = new_id();

    assert!(a.as_str().starts_with("candidate:"));
    assert_eq!(a.as_str().len(), "candidate:".len() + 12);
    assert_ne!(a, b);
}

#[test]
fn slug_id_normalizes_keys() {
    let id: TierId = slug_id(" Web Development-2 ");
    assert_eq!(id.as_str(), "tier:web-development-2");
}
