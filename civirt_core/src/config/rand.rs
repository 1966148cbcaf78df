// Random
use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 8;

/// Cloud-init instance id: the fqdn followed by a short random suffix,
/// so a rebuilt vm is never mistaken for the previous one.
pub fn instance_id(fqdn: &str) -> String {
    instance_id_with(fqdn, &mut rand::rng())
}

pub fn instance_id_with<R: Rng>(fqdn: &str, rng: &mut R) -> String {
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("{fqdn}{suffix}")
}
