/// Writes a message into an outgoing frame.
pub trait Serialize<'a> {
    /// Should write the header part of the message into `buf`.
    ///
    /// # Arguments
    /// * `buf` - The frame buffer, already holding the length prefix.
    ///
    /// # Returns
    /// A trailing slice of bytes to be written as is after `buf`, if any.
    fn serialize(&'a self, buf: &mut Vec<u8>) -> Option<&'a [u8]>;
}
