//! Embedding with custom collaborators: a patch provider with real behavior,
//! an add-hook policy, and a JSON config store.
//!
//! Run with: cargo run --example custom_collaborators

use async_trait::async_trait;
use graftbox::manifest::PatchDecl;
use graftbox::mods::{Patch, PatchContext, PatchStage};
use graftbox::provider::PatchProvider;
use graftbox::{HostConfig, JsonConfigStore, ModHost};
use std::fs;
use std::sync::Arc;

/// A patch that resolves a definition while it runs, the way real patch code
/// consults the pool before rewriting.
struct PrintingPatch {
    unit_id: String,
}

#[async_trait]
impl Patch for PrintingPatch {
    async fn load(&self, ctx: &PatchContext) -> anyhow::Result<()> {
        println!("[{}] loading unit {}", ctx.mod_id, self.unit_id);
        Ok(())
    }

    async fn run(&self, ctx: &PatchContext) -> anyhow::Result<()> {
        match ctx.defs.lookup("core").await {
            Some(def) => println!(
                "[{}] unit {} patching against core ({} bytes, {})",
                ctx.mod_id,
                self.unit_id,
                def.size(),
                &def.fingerprint()[..12]
            ),
            None => println!("[{}] unit {} found no core definition", ctx.mod_id, self.unit_id),
        }
        Ok(())
    }

    async fn shutdown(&self, ctx: &PatchContext) -> anyhow::Result<()> {
        println!("[{}] reverting unit {}", ctx.mod_id, self.unit_id);
        Ok(())
    }
}

struct PrintingProvider;

impl PatchProvider for PrintingProvider {
    fn resolve(
        &self,
        _mod_id: &str,
        decl: &PatchDecl,
        _stage: PatchStage,
    ) -> anyhow::Result<Arc<dyn Patch>> {
        Ok(Arc::new(PrintingPatch {
            unit_id: decl.id.clone(),
        }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    graftbox::util::logging::init_from_env();

    let root = tempfile::TempDir::new()?;
    let mods_root = root.path().join("mods");
    let defs_root = root.path().join("defs");
    fs::create_dir_all(mods_root.join("tweaks"))?;
    fs::create_dir_all(&defs_root)?;

    fs::write(
        mods_root.join("tweaks/mod.toml"),
        r#"
id = "tweaks"
version = "1.1.0"

[[early_patch]]
id = "pre-bind"

[[main_patch]]
id = "rebalance"
"#,
    )?;

    fs::write(
        defs_root.join("core.gdef"),
        b"GDEF1\nname=core\nversion=2.0\n---\nhost machine code",
    )?;

    let store = Arc::new(JsonConfigStore::new(root.path().join("host-state.json")));
    let host = ModHost::builder(HostConfig::default())
        .mods_root(&mods_root)
        .host_definitions(vec![defs_root])
        .with_provider(Arc::new(PrintingProvider))
        .with_store(store.clone())
        .build()?;

    // policy hook: refuse any mod that declares no version
    host.hooks().register(|event, canceled| {
        if event.subject.version.is_none() {
            println!("refusing unversioned mod '{}'", event.subject.id);
            *canceled = true;
        }
    });

    let report = host.run_pipeline().await?;
    println!(
        "pipeline clean: {}, {} definitions activated",
        report.clean(),
        report.materialized_definitions.len()
    );

    store.set_active_mods(host.mod_ids().await);
    let clean = host.shutdown_all().await;
    println!("shutdown clean: {}", clean);
    println!(
        "persisted state: {}",
        fs::read_to_string(root.path().join("host-state.json"))?
    );
    Ok(())
}
