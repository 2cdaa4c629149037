use std::io;

/// Reads a message out of a received frame, borrowing from it when possible.
pub trait Deserialize<'a>: Sized {
    /// Should parse `buf` into a new instance.
    ///
    /// # Arguments
    /// * `buf` - The frame body, 8 bytes aligned.
    ///
    /// # Returns
    /// The parsed value or an `InvalidData` io error.
    fn deserialize(buf: &'a [u8]) -> io::Result<Self>;
}
