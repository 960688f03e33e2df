//! Build script generating the C header for the FFI layer.

fn main() {
    println!("cargo:rerun-if-changed=src/ffi.rs");
    println!("cargo:rerun-if-changed=cbindgen.toml");

    let (Ok(crate_dir), Ok(out_dir)) = (
        std::env::var("CARGO_MANIFEST_DIR"),
        std::env::var("OUT_DIR"),
    ) else {
        return;
    };
    let config_path = std::path::Path::new(&crate_dir).join("cbindgen.toml");
    let config = cbindgen::Config::from_file(&config_path).unwrap_or_default();

    match cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        Ok(bindings) => {
            bindings.write_to_file(std::path::Path::new(&out_dir).join("u_bizlens.h"));

            // Development copy next to the sources
            let include_dir = std::path::Path::new(&crate_dir).join("include");
            if std::fs::create_dir_all(&include_dir).is_ok() {
                bindings.write_to_file(include_dir.join("u_bizlens.h"));
            }
        }
        Err(e) => println!("cargo:warning=C header not generated: {e}"),
    }
}
