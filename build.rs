//! Build script for generating WGSL constants shared with the culling shaders

use std::{env, fs, path::Path};

// Mirrors src/constants.rs. The constants test in that module checks that
// the generated include agrees with the Rust values.
const PYRAMID_LEVELS: u32 = 8;
const PYRAMID_TILE: u32 = 16;
const VISIBILITY_WORKGROUP: u32 = 64;
const REGION_SECTIONS_X: u32 = 8;
const REGION_SECTIONS_Y: u32 = 4;
const REGION_SECTIONS_Z: u32 = 8;
const SECTION_SIZE: u32 = 16;
const FACINGS: u32 = 6;
const RENDER_PASSES: u32 = 3;
const MAX_DISPATCH_GROUPS: u32 = 65535;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is always set for build scripts");
    let constants_path = Path::new(&out_dir).join("cull_constants.wgsl");

    fs::write(&constants_path, generate_wgsl_constants())
        .expect("Failed to write generated culling constants WGSL");
}

/// Generate WGSL constants
fn generate_wgsl_constants() -> String {
    let sections_per_region = REGION_SECTIONS_X * REGION_SECTIONS_Y * REGION_SECTIONS_Z;

    format!(
        r#"// AUTO-GENERATED CULLING CONSTANTS - DO NOT EDIT
// Generated by build.rs from the values in src/constants.rs

// Depth pyramid
const PYRAMID_LEVELS: u32 = {}u;
const PYRAMID_TILE: u32 = {}u;

// Object visibility
const VISIBILITY_WORKGROUP: u32 = {}u;
const OBJECT_ACTIVE: u32 = 1u;

// Region layout
const REGION_SECTIONS_X: u32 = {}u;
const REGION_SECTIONS_Y: u32 = {}u;
const REGION_SECTIONS_Z: u32 = {}u;
const SECTIONS_PER_REGION: u32 = {}u;
const SECTION_SIZE: f32 = {}.0;
const FACINGS: u32 = {}u;
const RENDER_PASSES: u32 = {}u;
const OVERFLOW_COUNTER: u32 = {}u;
const REGION_VALID: u32 = 1u;

// Cull view flags
const FLAG_HIZ: u32 = 1u;
const FLAG_FRUSTUM: u32 = 2u;
const FLAG_FACING: u32 = 4u;

const MAX_DISPATCH_GROUPS: u32 = {}u;
"#,
        PYRAMID_LEVELS,
        PYRAMID_TILE,
        VISIBILITY_WORKGROUP,
        REGION_SECTIONS_X,
        REGION_SECTIONS_Y,
        REGION_SECTIONS_Z,
        sections_per_region,
        SECTION_SIZE,
        FACINGS,
        RENDER_PASSES,
        RENDER_PASSES,
        MAX_DISPATCH_GROUPS,
    )
}
