use serde::{de::DeserializeOwned, Serialize};

use crate::error::{FsError, FsResult};

use super::digest;

/// Trait for digesting an object which stores digest in the object itself
///
/// The digest is computed over the bincode encoding with the digest field zeroed.
pub trait DigestInSelf: Serialize + Sized {
    fn digest_field(&mut self) -> &mut [u8; 32];

    fn digest(&mut self) -> FsResult<()> {
        *self.digest_field() = [0u8; 32];
        let digest = digest::digest(&*self)?;
        *self.digest_field() = digest;
        Ok(())
    }

    fn verify_digest(&mut self) -> FsResult<bool> {
        let stored = *self.digest_field();
        *self.digest_field() = [0u8; 32];
        let computed = digest::digest(&*self);
        *self.digest_field() = stored;
        Ok(stored == computed?)
    }
}

/// Trait for serializing and deserializing an object which stores digest in the object itself
/// # Note
/// This trait is implemented for all types implementing
/// [Serialize] and [DeserializeOwned] and [DigestInSelf]
pub trait SerializeAndDigest: Serialize + DeserializeOwned + DigestInSelf {
    /// serialize into a [Vec](std::vec::Vec)
    fn serialize(&mut self) -> FsResult<Vec<u8>> {
        self.digest()?;
        let config = bincode::config::legacy();
        Ok(bincode::serde::encode_to_vec(&*self, config)?)
    }

    /// deserialize from a slice
    /// # Returns
    /// A tuple containing the deserialized object and the number of bytes read
    fn deserialize(buf: &[u8]) -> FsResult<(Self, usize)> {
        let config = bincode::config::legacy();
        let (mut object, bytes_read): (Self, usize) =
            bincode::serde::decode_from_slice(buf, config)?;
        if !object.verify_digest()? {
            Err(FsError::Corrupted(format!(
                "{} digest verification failed",
                std::any::type_name::<Self>()
            )))
        } else {
            Ok((object, bytes_read))
        }
    }
}
