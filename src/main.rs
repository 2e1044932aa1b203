#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::init();
    accretion::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
