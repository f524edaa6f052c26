//! Build script for cohbench-core
//!
//! Generates the shared-region layout both agents compile against:
//! 1. Start with library defaults (the 8 MiB DDR window)
//! 2. If COHBENCH_LAYOUT_RS env var is set, parse the user's layout file
//! 3. Merge user values over defaults (user wins)
//! 4. Generate OUT_DIR/cohbench_layout.rs
//!
//! The Controller and the Responder firmware must be built with the same
//! layout file. Nothing checks this at runtime.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

#[path = "layout_file.rs"]
mod layout_file;

/// Layout parameter definition
struct LayoutParam {
    name: &'static str,
    rust_type: &'static str,
    default_value: &'static str,
}

/// All layout parameters with their defaults
const LAYOUT_PARAMS: &[LayoutParam] = &[
    LayoutParam {
        name: "REGION_SIZE",
        rust_type: "usize",
        default_value: "0x0080_0000", // 8 MiB
    },
    LayoutParam {
        name: "CACHE_LINE_SIZE",
        rust_type: "usize",
        default_value: "64",
    },
    LayoutParam {
        name: "MAX_PAYLOAD",
        rust_type: "usize",
        default_value: "64 * 1024",
    },
    LayoutParam {
        name: "RESULTS_OFFSET",
        rust_type: "usize",
        default_value: "0x0040_0000", // 4 MiB
    },
    LayoutParam {
        name: "MAX_RESULTS",
        rust_type: "usize",
        default_value: "10_000",
    },
];

fn main() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let dest_path = Path::new(&out_dir).join("cohbench_layout.rs");

    // Start with defaults
    let mut layout: HashMap<&str, String> = LAYOUT_PARAMS
        .iter()
        .map(|p| (p.name, p.default_value.to_string()))
        .collect();

    if let Ok(user_path) = env::var("COHBENCH_LAYOUT_RS") {
        println!("cargo:rerun-if-changed={}", user_path);

        match fs::read_to_string(&user_path) {
            Ok(content) => {
                parse_and_merge(&content, &mut layout);
                println!("cargo:warning=Using custom region layout: {}", user_path);
            }
            Err(e) => {
                println!(
                    "cargo:warning=Failed to read COHBENCH_LAYOUT_RS ({}): {}",
                    user_path, e
                );
            }
        }
    }

    println!("cargo:rerun-if-env-changed=COHBENCH_LAYOUT_RS");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=layout_file.rs");

    let output = generate_layout(&layout);
    fs::write(&dest_path, &output).expect("Failed to write region layout");
}

/// Parse user's layout file and merge values into the layout map
fn parse_and_merge(content: &str, layout: &mut HashMap<&str, String>) {
    for (name, value) in layout_file::parse_layout(content) {
        match LAYOUT_PARAMS.iter().find(|p| p.name == name) {
            Some(param) => {
                layout.insert(param.name, value);
            }
            None => println!("cargo:warning=Unknown layout parameter: {}", name),
        }
    }
}

/// Generate the layout Rust file
fn generate_layout(layout: &HashMap<&str, String>) -> String {
    let mut output = String::new();

    output.push_str("// Auto-generated by build.rs - do not edit\n");
    output.push_str("// Region layout merged from library defaults");
    if env::var("COHBENCH_LAYOUT_RS").is_ok() {
        output.push_str(" and the user's layout file");
    }
    output.push_str("\n\n");

    for param in LAYOUT_PARAMS {
        let value = layout
            .get(param.name)
            .map(String::as_str)
            .unwrap_or(param.default_value);
        output.push_str(&format!(
            "pub const {}: {} = {};\n",
            param.name, param.rust_type, value
        ));
    }

    output
}
