//! Reads a password from stdin and prints its Argon2id hash, for seeding a
//! credential store by hand.

use std::io::{self, Write};

use keygate_core::{HashCost, PasswordHasher};

fn main() -> anyhow::Result<()> {
    eprint!("Enter password: ");
    io::stderr().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']);

    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    let mut cost = HashCost::default();
    if let Ok(val) = std::env::var("KEYGATE_HASH_MEMORY_KIB") {
        cost.memory_kib = val.parse()?;
    }
    if let Ok(val) = std::env::var("KEYGATE_HASH_ITERATIONS") {
        cost.iterations = val.parse()?;
    }

    let hash = PasswordHasher::new(cost)?.hash(password)?;
    println!("{hash}");
    Ok(())
}
