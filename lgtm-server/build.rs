fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Packaged builds have no .git directory; they pass the hash in instead.
    println!("cargo:rerun-if-env-changed=LGTM_GIT_HASH");
    if let Ok(hash) = std::env::var("LGTM_GIT_HASH") {
        println!("cargo:rustc-env=LGTM_GIT_HASH={}", hash);
    }
}
