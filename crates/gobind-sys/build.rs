fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // The shim runtime needs nothing from the system.
    if std::env::var_os("CARGO_FEATURE_SYSTEM").is_none() {
        return;
    }

    println!("cargo:rustc-link-lib=gobject-2.0");
    println!("cargo:rustc-link-lib=glib-2.0");

    #[cfg(target_os = "macos")]
    {
        // Homebrew on Apple Silicon
        println!("cargo:rustc-link-search=/opt/homebrew/lib");
        // Homebrew on Intel
        println!("cargo:rustc-link-search=/usr/local/lib");
    }

    #[cfg(target_os = "linux")]
    println!("cargo:rustc-link-search=/usr/lib/x86_64-linux-gnu");
}
