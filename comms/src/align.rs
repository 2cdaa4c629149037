/// Primitive number types whose alignment is at least 8 bytes.
///
/// Receive buffers made of these can be reinterpreted as `f64` parameter slices
/// without copying.
pub trait Align8: bytemuck::Pod {}

impl Align8 for u64 {}
impl Align8 for i64 {}
impl Align8 for f64 {}
