//! Writes a float ramp into a named shared object, then keeps it alive
//! for readers.
//!
//! Usage:
//! ```bash
//! cargo run --example writer
//! ```

use std::thread;
use std::time::Duration;

use xshm_core::{global, ElementType};

const NAME: &str = "/xshm_demo";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let shm = global();

    let mut seg = match shm.create_named(NAME, 1024, ElementType::Float32)? {
        Some(seg) => seg,
        None => {
            println!("{NAME} already exists; run the reader, or destroy it first");
            return Ok(());
        }
    };

    for (i, v) in seg.as_mut_slice::<f32>()?.iter_mut().enumerate() {
        *v = i as f32 * 0.5;
    }
    println!("created {NAME}: {} elements, {} bytes", seg.len(), seg.byte_len());
    println!("run the reader in another terminal; Ctrl+C unlinks the object");

    loop {
        thread::sleep(Duration::from_secs(1));
    }
}
