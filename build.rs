use std::env;

fn main() {
    tauri_build::build();

    // The Android host layer ships the sensor/permission glue as a prebuilt
    // shared library; the extern "C" symbols in android_bridge.rs resolve
    // against it. Non-Android targets compile the inert stubs instead.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("android") {
        if let Ok(search_dir) = env::var("POKEWALK_SENSOR_GLUE_DIR") {
            println!("cargo:rustc-link-search=native={search_dir}");
        }
        println!("cargo:rustc-link-lib=dylib=pokewalk_sensor_glue");
    }
}
