//! WebSocket frame masking
//!
//! XOR of each payload byte with the corresponding byte of a rotating
//! 4-byte key. The same operation masks and unmasks.

use std::cell::Cell;

/// Apply (or remove) a mask in place.
///
/// Processes eight bytes at a time with a doubled key word, then
/// finishes the tail byte-wise.
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    let key64 = u64::from_ne_bytes([
        key[0], key[1], key[2], key[3], key[0], key[1], key[2], key[3],
    ]);

    let mut chunks = data.chunks_exact_mut(8);
    for chunk in &mut chunks {
        let word = u64::from_ne_bytes(chunk.try_into().unwrap()) ^ key64;
        chunk.copy_from_slice(&word.to_ne_bytes());
    }

    // remainder starts at a multiple of 8, so the key offset is i & 3
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}

thread_local! {
    static RNG_STATE: Cell<u64> = const { Cell::new(0) };
}

/// Generate a masking key from a thread-local xorshift64 generator.
///
/// Seeded on first use per thread. The key only has to be
/// non-repeating for protocol conformance, not unpredictable.
pub fn generate_mask() -> [u8; 4] {
    RNG_STATE.with(|state| {
        let mut s = state.get();

        if s == 0 {
            s = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64;
            s ^= &s as *const _ as u64;
            s |= 1;
        }

        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;

        state.set(s);
        (s as u32).to_ne_bytes()
    })
}
