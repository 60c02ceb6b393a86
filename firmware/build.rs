use std::path::PathBuf;
use std::{env, fs};

struct Layout {
    flash_origin: u32,
    flash_end: u32,
    ram_origin: u32,
    ram_end: u32,
}

// Application flash runs from the end of the SoftDevice up to the name page,
// which is the last page before the bootloader. RAM starts above what the
// SoftDevice needs for one peripheral link.
const NRF52810_S112: Layout = Layout {
    flash_origin: 0x0001_9000,
    flash_end: 0x0002_F000,
    ram_origin: 0x2000_3000,
    ram_end: 0x2000_6000,
};

const NRF52840_S140: Layout = Layout {
    flash_origin: 0x0002_7000,
    flash_end: 0x000D_F000,
    ram_origin: 0x2000_8000,
    ram_end: 0x2004_0000,
};

fn main() {
    let layout = if env::var_os("CARGO_FEATURE__NRF52840").is_some() {
        NRF52840_S140
    } else {
        NRF52810_S112
    };

    let memory_x = format!(
        "\
MEMORY
{{
  FLASH : ORIGIN = {:#010x}, LENGTH = {:#08x}
  RAM   : ORIGIN = {:#010x}, LENGTH = {:#08x}
}}

__name_page = {:#010x};
",
        layout.flash_origin,
        layout.flash_end - layout.flash_origin,
        layout.ram_origin,
        layout.ram_end - layout.ram_origin,
        layout.flash_end,
    );

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::write(out_dir.join("memory.x"), memory_x).expect("write memory.x");

    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=build.rs");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    println!("cargo:rustc-link-arg-bins=--print-memory-usage");
}
