// Generic Object Pool
// Thread-safe pool of reusable resources with blocking and async borrow

// This is just a binary wrapper - the actual library is in lib.rs
// Run examples with: cargo run --example basic

use generic_objectpool::{FnFactory, Pool, PoolConfiguration};

fn main() {
    println!("=== Generic Object Pool ===");
    println!("See demos/ directory for usage examples");
    println!("Run: cargo run --example basic");
    println!();

    // Quick demo
    println!("Quick Demo:");
    let pool = Pool::with_factory(
        PoolConfiguration::new().with_max_total(3),
        FnFactory::new(|| Ok(String::from("connection"))),
    );

    match pool.borrow() {
        Ok(obj) => println!("  Got object: {} (entry {})", *obj, obj.id()),
        Err(error) => println!("  Borrow failed: {error}"),
    }

    println!("  Idle after return: {}", pool.idle_count());
}
