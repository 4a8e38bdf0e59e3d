use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::SymmetricKey;
use crate::device::DeviceIdSource;

/// Key-encryption key: `SHA-256(id ++ id)` over the device identifier.
///
/// Never persisted. If the identifier changes, the key file written under the
/// old KEK can no longer be opened.
pub fn derive_kek(source: &dyn DeviceIdSource) -> SymmetricKey {
    kek_for_id(&source.device_id())
}

pub fn kek_for_id(device_id: &str) -> SymmetricKey {
    let doubled = Zeroizing::new(device_id.repeat(2));
    let digest: [u8; 32] = Sha256::digest(doubled.as_bytes()).into();
    SymmetricKey::from_bytes(digest)
}
