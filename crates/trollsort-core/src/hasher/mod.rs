pub mod sha256;

pub use sha256::{hash_file, Fingerprint, HashingWriter};
