//! Post-race log archival

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{RaceError, RaceResult};
use crate::traits::Archiver;

/// Compress the race's log directory into `archive`, then delete it
///
/// Runs on the blocking pool. The directory is only removed once the archive
/// was written.
pub(crate) async fn sweep(
    archiver: Arc<dyn Archiver>,
    log_root: PathBuf,
    archive: PathBuf,
) -> RaceResult<()> {
    tracing::info!("Archiving logs in {}", archive.display());

    let target = archive.clone();
    let swept = tokio::task::spawn_blocking(move || {
        archiver.compress(&log_root, &target)?;
        archiver.remove_tree(&log_root)
    })
    .await;

    match swept {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(RaceError::Archive {
            path: archive,
            source,
        }),
        Err(join) => Err(RaceError::Archive {
            path: archive,
            source: Box::new(join),
        }),
    }
}
