//! Native filesystem notifications feeding a [`ChangeWatcher`]

use std::path::Path;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::{ChangeWatcher, WatchEvent};
use crate::error::{AssetError, Result};
use crate::runtime::AsyncSpawner;

/// Keeps an OS watch on the asset root alive
///
/// Dropping it stops the notifications.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
}

impl FsWatcher {
    /// Watch `root` recursively, forwarding every event to `watcher`
    pub fn start<S: AsyncSpawner>(watcher: ChangeWatcher<S>, root: &Path) -> Result<Self> {
        let mut native = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in translate(&event) {
                    watcher.handle(change);
                }
            }
            Err(e) => log::warn!("Filesystem watch error: {}", e),
        })
        .map_err(|e| AssetError::Other(anyhow::Error::from(e)))?;

        native
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| AssetError::Other(anyhow::Error::from(e)))?;
        log::info!("Watching {} for asset changes", root.display());

        Ok(Self { _watcher: native })
    }
}

/// Map a native event onto the watcher's vocabulary
pub(crate) fn translate(event: &Event) -> Vec<WatchEvent> {
    let paths = &event.paths;
    match event.kind {
        EventKind::Create(_) => paths.iter().cloned().map(WatchEvent::Created).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match paths.as_slice() {
            [from, to, ..] => vec![WatchEvent::Renamed {
                from: from.clone(),
                to: to.clone(),
            }],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.iter().cloned().map(WatchEvent::Created).collect()
        }
        // The matching `To`/`Both` event carries the rename
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .iter()
            .map(|p| {
                if p.exists() {
                    WatchEvent::Created(p.clone())
                } else {
                    WatchEvent::Removed(p.clone())
                }
            })
            .collect(),
        EventKind::Modify(_) => paths.iter().cloned().map(WatchEvent::Changed).collect(),
        EventKind::Remove(_) => paths.iter().cloned().map(WatchEvent::Removed).collect(),
        _ => Vec::new(),
    }
}
