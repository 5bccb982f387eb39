//! Remote build-output cache for stowage (S3 compatible).

pub mod archiver;
pub mod factory;
pub mod filesystem;
pub mod keys;
pub mod memory;
pub mod pipe;
pub mod remote;
pub mod s3;
pub mod skip;
pub mod sponge;
pub mod timeout;

pub use archiver::{pack, unpack, TAR_CONTENT_TYPE};
pub use factory::StorageFactory;
pub use filesystem::FilesystemObjectStore;
pub use keys::encode_key;
pub use memory::{MemoryObjectStore, StoredObject};
pub use remote::RemoteCacheStorage;
pub use s3::{S3ObjectStore, PART_SIZE};
pub use skip::SkipStorage;
pub use sponge::{Sponge, DEFAULT_BUFFER_LIMIT};
pub use timeout::{HangTimeout, HANG_TIMEOUT};
