//! Secret handling for restsync
//!
//! Two cooperating parts:
//!
//! - **Secret store** ([`store`]): an encrypted key/value file scoped by
//!   `(resource path, key)`. The whole table is sealed with AES-256-GCM
//!   under a raw key or an Argon2id passphrase-derived key ([`envelope`], [`kdf`]).
//! - **Placeholder codec** ([`codec`]): swaps secret attribute values in a
//!   resource body for `{{secret .}}` placeholders and back, so plaintext
//!   never lands in the resource repository.

pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod placeholder;
pub mod store;

pub use codec::{collect_placeholders, has_placeholders, mask, normalize_for_diff, resolve};
pub use config::{KeySource, SecretStoreConfig};
pub use error::{Error, Result};
pub use kdf::KdfParams;
pub use placeholder::{CANONICAL_PLACEHOLDER, Placeholder};
pub use store::{FileSecretStore, SecretStore};
