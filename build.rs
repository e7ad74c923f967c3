// Necessary because of this issue: https://github.com/rust-lang/cargo/issues/9641
fn main() -> Result<(), Box<dyn std::error::Error>> {
    for key in [
        "DEVICE_ID",
        "DEVICE_SECRET",
        "API_INGEST_URL",
        "API_HEALTHCHECK_URL",
        "TZ_OFFSET_HOURS",
        "WIFI_SSID",
        "WIFI_PASSWORD",
        "LOG_LEVEL",
    ] {
        println!("cargo:rerun-if-env-changed={key}");
    }

    // the ESP-IDF link args only exist when building for the device; host
    // builds (and tests) don't need them.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::build::CfgArgs::output_propagated("ESP_IDF")?;
        embuild::build::LinkArgs::output_propagated("ESP_IDF")?;
    }
    Ok(())
}
