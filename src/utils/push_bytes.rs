use bitcoin::script::PushBytesBuf;

use crate::SwapResult;

pub fn bytes_to_push_bytes(bytes: &[u8]) -> SwapResult<PushBytesBuf> {
    let mut push_bytes = PushBytesBuf::with_capacity(bytes.len());
    push_bytes.extend_from_slice(bytes)?;

    Ok(push_bytes)
}
