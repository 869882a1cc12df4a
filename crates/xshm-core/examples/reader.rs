//! Reads the ramp written by the writer example.
//!
//! Usage:
//! ```bash
//! cargo run --example reader
//! ```

use xshm_core::{global, ElementType};

const NAME: &str = "/xshm_demo";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let shm = global();

    match shm.get(NAME, ElementType::Float32)? {
        Some(seg) => {
            let data = seg.as_slice::<f32>()?;
            let head = &data[..4.min(data.len())];
            println!("read {} elements, first values: {head:?}", data.len());
            shm.detach(NAME)?;
        }
        None => println!("nothing at {NAME}; start the writer first"),
    }
    Ok(())
}
