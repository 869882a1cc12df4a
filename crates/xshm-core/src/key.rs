//! Random key generation for keyed segments

use rand::Rng;

use crate::id::{KEY_MAX, KEY_MIN};

/// Attempts before an auto-keyed create gives up
pub(crate) const MAX_KEY_RETRIES: usize = 64;

/// Generator of candidate keys for auto-keyed segments
///
/// Keys are drawn uniformly from [`KEY_MIN`] ..= [`KEY_MAX`]; collisions with
/// existing segments are resolved by the caller retrying with a fresh draw.
#[derive(Debug, Default)]
pub struct KeyAllocator;

impl KeyAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Draw the next candidate key
    pub fn draw(&mut self) -> u32 {
        rand::thread_rng().gen_range(KEY_MIN..=KEY_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_stays_in_range() {
        let mut keys = KeyAllocator::new();
        for _ in 0..1000 {
            let key = keys.draw();
            assert!((KEY_MIN..=KEY_MAX).contains(&key));
        }
    }
}
