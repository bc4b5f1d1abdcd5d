//! Mod discovery phase

use crate::host::admit_mod;
use crate::manifest::{ModManifest, ModTier, MANIFEST_FILE};
use crate::mods::{Mod, Patch, PatchStage};
use crate::pipeline::{HostPhase, PipelineContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Discovers one tier's artifacts, parses manifests, binds patch behaviors,
/// and admits the resulting mods into the registry. Artifact errors are
/// logged and skipped; discovery never aborts the pipeline.
pub struct DiscoverPhase {
    tier: ModTier,
}

impl DiscoverPhase {
    pub fn new(tier: ModTier) -> Self {
        Self { tier }
    }
}

#[async_trait]
impl HostPhase for DiscoverPhase {
    fn name(&self) -> &'static str {
        match self.tier {
            ModTier::Integration => "discover:integration",
            ModTier::Regular => "discover:regular",
        }
    }

    async fn execute(&self, context: &mut PipelineContext<'_>) -> Result<()> {
        let root = match context.root_for(self.tier) {
            Some(root) => root.clone(),
            None => {
                debug!(tier = self.tier.as_str(), "No root configured, skipping discovery");
                return Ok(());
            }
        };

        let candidates = context.scanner.discover(&root);
        info!(
            tier = self.tier.as_str(),
            root = %root.display(),
            candidates = candidates.len(),
            "Discovered candidate artifacts"
        );

        let mut admitted = 0;
        for artifact in candidates {
            match build_mod(context, &artifact, self.tier) {
                Ok(Some(m)) => {
                    let id = m.id.clone();
                    match admit_mod(context.registry, context.index, context.hooks, m) {
                        Ok(true) => admitted += 1,
                        Ok(false) => {
                            info!(mod_id = %id, "Mod add canceled by hook");
                        }
                        Err(err) => {
                            debug!(mod_id = %id, error = %err, "Mod not admitted");
                        }
                    }
                }
                Ok(None) => {} // different tier; its own discovery step handles it
                Err(err) => {
                    warn!(
                        artifact = %artifact.display(),
                        error = %err,
                        "Failed to load mod artifact"
                    );
                }
            }
        }

        info!(tier = self.tier.as_str(), admitted, "Discovery complete");
        let tier = self.tier.as_str();
        context.log.info("host", move || {
            format!("discovered {} {} mods under {}", admitted, tier, root.display())
        });
        Ok(())
    }
}

/// Parse an artifact directory into a [`Mod`], or `None` when its manifest
/// belongs to a different tier than the one being discovered.
fn build_mod(
    context: &PipelineContext<'_>,
    artifact: &Path,
    tier: ModTier,
) -> Result<Option<Mod>> {
    let manifest_path = artifact.join(MANIFEST_FILE);
    let text = context
        .fs
        .read_to_string(&manifest_path)
        .with_context(|| format!("Failed to read manifest at {:?}", manifest_path))?;
    let manifest = ModManifest::parse(&text)
        .with_context(|| format!("Invalid manifest at {:?}", manifest_path))?;

    if manifest.tier != tier {
        debug!(
            mod_id = %manifest.id,
            declared = manifest.tier.as_str(),
            scanning = tier.as_str(),
            "Manifest tier does not match the cohort being discovered"
        );
        return Ok(None);
    }

    let early = resolve_behaviors(context, &manifest, PatchStage::Early)?;
    let main = resolve_behaviors(context, &manifest, PatchStage::Main)?;

    Ok(Some(Mod::from_manifest(
        &manifest,
        artifact.to_path_buf(),
        early,
        main,
    )))
}

fn resolve_behaviors(
    context: &PipelineContext<'_>,
    manifest: &ModManifest,
    stage: PatchStage,
) -> Result<Vec<Arc<dyn Patch>>> {
    let decls = match stage {
        PatchStage::Early => &manifest.early_patches,
        PatchStage::Main => &manifest.main_patches,
    };

    decls
        .iter()
        .map(|decl| {
            context
                .provider
                .resolve(&manifest.id, decl, stage)
                .with_context(|| {
                    format!(
                        "No behavior for {} patch unit '{}' of mod '{}'",
                        stage.as_str(),
                        decl.id,
                        manifest.id
                    )
                })
        })
        .collect()
}
