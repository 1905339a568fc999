// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = std::env::var("OUT_DIR")?;
    let path = std::path::Path::new(&out_dir).join("env_vars.rs");
    let mut f = std::fs::File::create(path)?;

    let vars = [
        ("RUNQ_DATA_DIR", "RUNQ_DATA_DIR"),
        ("RUNQ_CONFIG", "RUNQ_CONFIG"),
        ("RUNQ_MAX_BATCH_SIZE_BYTES", "RUNQ_MAX_BATCH_SIZE_BYTES"),
        ("RUNQ_SYNC_AFTER_STOP_TIMEOUT", "RUNQ_SYNC_AFTER_STOP_TIMEOUT"),
        ("RUST_LOG", "RUST_LOG"),
    ];

    for (const_name, env_name) in &vars {
        writeln!(f, "pub const {const_name}: &str = \"{env_name}\";")?;
    }

    Ok(())
}
