#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    airnode::esp::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("airnode only runs on ESP-IDF targets; run `cargo test` to exercise it on the host")
}
