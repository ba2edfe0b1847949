//! Promotion: moves completed staged submissions into the permanent stores and
//! records them in the catalog.
//!
//! Flow per pass: scan staging → for each complete group relocate image and
//! prompt → rewrite catalog once → delete the title markers.
//!
//! The title marker is deleted last. A pass interrupted anywhere before that is
//! safe to re-run: already-moved files are skipped and an image path already in
//! the catalog is not recorded twice. A group whose destination is taken, or
//! whose image or prompt exists nowhere, stays whole in staging.

use std::fs;
use std::io;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::staging::{ArtifactKind, PermanentStores, StagedItem, StagingArea};
use crate::store::catalog::{Catalog, CatalogRecord};

/// Where one artifact of a completed group currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relocation {
    Staged,
    AlreadyMoved,
    Missing,
}

pub struct Promoter {
    staging: StagingArea,
    stores: PermanentStores,
    catalog: Catalog,
}

impl Promoter {
    pub fn new(staging: StagingArea, stores: PermanentStores, catalog: Catalog) -> Self {
        Self {
            staging,
            stores,
            catalog,
        }
    }

    /// Runs one promotion pass and returns the promoted base identifiers.
    /// Incomplete groups are left untouched; a failing group never blocks the others.
    pub fn promote(&self) -> Result<Vec<String>, AppError> {
        let items = self.staging.scan()?;
        let mut records = self.catalog.load()?;
        let mut promoted = Vec::new();

        for (base, item) in &items {
            let title = match item {
                StagedItem::Complete { title } => title,
                StagedItem::Incomplete {
                    has_image,
                    has_prompt,
                } => {
                    debug!(
                        base = %base,
                        has_image,
                        has_prompt,
                        "Skipping incomplete submission"
                    );
                    continue;
                }
            };

            match self.relocate(base) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    error!(base = %base, "Promotion failed: {e}");
                    continue;
                }
            }

            let image = self.stores.image_ref(base);
            if records.iter().any(|r| r.image == image) {
                info!(base = %base, "Already catalogued; finishing interrupted promotion");
            } else {
                records.push(CatalogRecord {
                    image,
                    prompt: self.stores.prompt_ref(base),
                    title: title.clone(),
                    created_at: Utc::now(),
                });
            }
            promoted.push(base.clone());
        }

        if promoted.is_empty() {
            info!("No completed submissions to promote");
            return Ok(promoted);
        }

        self.catalog.save(&records)?;

        for base in &promoted {
            // A surviving marker is retried next pass; the catalog check stops duplicates.
            if let Err(e) = self.staging.remove(base, ArtifactKind::Title) {
                error!(base = %base, "Could not remove title marker: {e}");
            }
        }

        info!("Completed items: {}", promoted.join(", "));
        Ok(promoted)
    }

    /// Moves the image and prompt of `base` into the permanent stores.
    ///
    /// Every destination is checked before anything moves, so a collision or a
    /// vanished artifact leaves the group untouched in staging. Returns `false`
    /// when the group must be skipped this pass.
    fn relocate(&self, base: &str) -> Result<bool, AppError> {
        let moves = [
            (
                "image",
                self.staging.path(base, ArtifactKind::Image),
                self.stores.image_path(base),
            ),
            (
                "prompt",
                self.staging.path(base, ArtifactKind::Prompt),
                self.stores.prompt_path(base),
            ),
        ];

        for (kind, from, to) in &moves {
            match plan_move(from, to)? {
                Relocation::Missing => {
                    warn!(base = %base, "{kind} missing from staging and permanent store");
                    return Ok(false);
                }
                Relocation::AlreadyMoved => {
                    info!(base = %base, "{kind} already in permanent store")
                }
                Relocation::Staged => {}
            }
        }

        let mut moved: Vec<(&Path, &Path)> = Vec::new();
        for (kind, from, to) in &moves {
            if !from.exists() {
                continue;
            }
            if let Err(e) = move_file(from, to) {
                for (back_to, back_from) in moved.into_iter().rev() {
                    if let Err(undo) = move_file(back_from, back_to) {
                        error!(
                            base = %base,
                            "Could not return {} to staging: {undo}",
                            back_from.display()
                        );
                    }
                }
                return Err(e);
            }
            debug!(base = %base, "Moved {kind}");
            moved.push((from.as_path(), to.as_path()));
        }
        Ok(true)
    }
}

/// Classifies one pending move without touching the filesystem.
/// An occupied destination with the source still staged is a collision.
fn plan_move(from: &Path, to: &Path) -> Result<Relocation, AppError> {
    match (from.exists(), to.exists()) {
        (true, true) => Err(AppError::Storage {
            path: to.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "destination already holds a different artifact",
            ),
        }),
        (true, false) => Ok(Relocation::Staged),
        (false, true) => Ok(Relocation::AlreadyMoved),
        (false, false) => Ok(Relocation::Missing),
    }
}

/// Moves `from` to `to`. Callers check the destination first.
fn move_file(from: &Path, to: &Path) -> Result<(), AppError> {
    if let Some(dir) = to.parent() {
        fs::create_dir_all(dir).map_err(AppError::storage(dir))?;
    }

    if let Err(rename_err) = fs::rename(from, to) {
        // rename cannot cross filesystems
        debug!("rename {} failed ({rename_err}); copying", from.display());
        fs::copy(from, to).map_err(AppError::storage(to))?;
        fs::remove_file(from).map_err(AppError::storage(from))?;
    }
    Ok(())
}
