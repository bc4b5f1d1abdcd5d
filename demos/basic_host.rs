//! Minimal embedding: discover mods from a directory, run the pipeline,
//! shut down.
//!
//! Run with: cargo run --example basic_host

use graftbox::{HostConfig, ModHost};
use std::fs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    graftbox::util::logging::init_default();

    // stage a tiny mod layout to drive the engine against
    let root = tempfile::TempDir::new()?;
    let mods_root = root.path().join("mods");
    let defs_root = root.path().join("defs");
    fs::create_dir_all(mods_root.join("base"))?;
    fs::create_dir_all(mods_root.join("extras"))?;
    fs::create_dir_all(&defs_root)?;

    fs::write(
        mods_root.join("base/mod.toml"),
        r#"
id = "base"
title = "Base Content"
version = "1.0.0"

[[main_patch]]
id = "content-hooks"
"#,
    )?;

    fs::write(
        mods_root.join("extras/mod.toml"),
        r#"
id = "extras"
title = "Extra Content"
version = "0.2.0"

[[dependency]]
id = "base"
requirement = ">=1.0"

[[main_patch]]
id = "extra-hooks"
"#,
    )?;

    fs::write(
        defs_root.join("core.gdef"),
        b"GDEF1\nname=core\nversion=1.0\n---\nhost machine code",
    )?;

    let host = ModHost::builder(HostConfig::default())
        .mods_root(&mods_root)
        .host_definitions(vec![defs_root])
        .build()?;

    let report = host.run_pipeline().await?;
    println!("run {} clean: {}", report.run_id, report.clean());
    println!("mods loaded, in order: {:?}", host.mod_ids().await);
    println!("definitions activated: {:?}", report.materialized_definitions);

    let clean = host.shutdown_all().await;
    println!("shutdown clean: {}", clean);
    Ok(())
}
