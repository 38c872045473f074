//! File watching for live preview.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Quiet period that ends a burst of filesystem events.
const DEBOUNCE: Duration = Duration::from_millis(75);

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchEvent {
    /// The component source was written or replaced
    SourceChanged(PathBuf),

    /// Something under the assets directory changed
    AssetChanged(PathBuf),

    /// The component source was removed
    Deleted(PathBuf),
}

/// Watches the source file and an optional assets directory.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Create a new file watcher.
    ///
    /// The source file's directory is watched rather than the file, so
    /// editors that save by rename are still seen. Events are delivered
    /// once a burst has settled.
    pub fn new(
        source: &Path,
        assets: Option<&Path>,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let source = resolve(source)?;
        let source_dir = source
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| std::io::Error::other("source path has no parent directory"))?;
        let assets = match assets {
            Some(dir) if dir.exists() => Some(dir.canonicalize()?),
            _ => None,
        };

        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        watcher
            .watch(&source_dir, RecursiveMode::NonRecursive)
            .map_err(std::io::Error::other)?;
        if let Some(dir) = &assets {
            watcher
                .watch(dir, RecursiveMode::Recursive)
                .map_err(std::io::Error::other)?;
        }

        let thread_source = source.clone();
        std::thread::Builder::new()
            .name("capsule-watcher".to_string())
            .spawn(move || {
                let source = thread_source;
                while let Ok(first) = sync_rx.recv() {
                    let mut batch = Vec::new();
                    collect(&mut batch, &first, &source, assets.as_deref());

                    // Trailing edge: keep gathering until the burst goes quiet
                    loop {
                        match sync_rx.recv_timeout(DEBOUNCE) {
                            Ok(event) => collect(&mut batch, &event, &source, assets.as_deref()),
                            Err(mpsc::RecvTimeoutError::Timeout) => break,
                            Err(mpsc::RecvTimeoutError::Disconnected) => return,
                        }
                    }

                    for event in batch {
                        if async_tx.blocking_send(event).is_err() {
                            return;
                        }
                    }
                }
            })?;

        tracing::debug!("Watching {}", source.display());

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Absolute form of `source`, resolving its directory even if the file is missing.
fn resolve(source: &Path) -> Result<PathBuf, std::io::Error> {
    let file_name = source
        .file_name()
        .ok_or_else(|| std::io::Error::other("source path has no file name"))?;
    let dir = match source.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.canonicalize()?,
        _ => std::env::current_dir()?,
    };
    Ok(dir.join(file_name))
}

fn collect(batch: &mut Vec<WatchEvent>, event: &notify::Event, source: &Path, assets: Option<&Path>) {
    for path in &event.paths {
        if let Some(watch_event) = classify_event(path, &event.kind, source, assets) {
            // A later event for the same path replaces an earlier one
            batch.retain(|existing| event_path(existing) != path.as_path());
            batch.push(watch_event);
        }
    }
}

fn event_path(event: &WatchEvent) -> &Path {
    match event {
        WatchEvent::SourceChanged(path)
        | WatchEvent::AssetChanged(path)
        | WatchEvent::Deleted(path) => path,
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(
    path: &Path,
    kind: &EventKind,
    source: &Path,
    assets: Option<&Path>,
) -> Option<WatchEvent> {
    if !matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return None;
    }

    if path == source {
        return match kind {
            EventKind::Remove(_) => Some(WatchEvent::Deleted(path.to_path_buf())),
            _ => Some(WatchEvent::SourceChanged(path.to_path_buf())),
        };
    }

    match assets {
        Some(dir) if path.starts_with(dir) => Some(WatchEvent::AssetChanged(path.to_path_buf())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn classifies_source_and_assets() {
        let source = Path::new("/p/page.tsx");
        let assets = Some(Path::new("/p/assets"));
        let modify = EventKind::Modify(ModifyKind::Any);

        assert_eq!(
            classify_event(source, &modify, source, assets),
            Some(WatchEvent::SourceChanged(source.to_path_buf()))
        );
        assert_eq!(
            classify_event(source, &EventKind::Remove(RemoveKind::File), source, assets),
            Some(WatchEvent::Deleted(source.to_path_buf()))
        );
        assert_eq!(
            classify_event(Path::new("/p/assets/logo.svg"), &EventKind::Create(CreateKind::File), source, assets),
            Some(WatchEvent::AssetChanged(PathBuf::from("/p/assets/logo.svg")))
        );
        assert_eq!(classify_event(Path::new("/p/other.tsx"), &modify, source, assets), None);
        assert_eq!(
            classify_event(source, &EventKind::Access(notify::event::AccessKind::Any), source, assets),
            None
        );
    }

    #[test]
    fn bursts_collapse_per_path() {
        let source = PathBuf::from("/p/page.tsx");
        let mut batch = Vec::new();
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Any)).add_path(source.clone());

        collect(&mut batch, &event, &source, None);
        collect(&mut batch, &event, &source, None);

        assert_eq!(batch, vec![WatchEvent::SourceChanged(source)]);
    }

    #[tokio::test]
    async fn watches_source_file() {
        let temp = tempdir().unwrap();
        let source = temp.path().join("page.tsx");
        fs::write(&source, "export default function A() {}").unwrap();

        let (watcher, mut rx) = FileWatcher::new(&source, None).unwrap();

        // Give inotify time to set up
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(temp.path().join("unrelated.txt"), "x").unwrap();
        fs::write(&source, "export default function B() {}").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await;

        drop(watcher);

        let event = event.expect("timeout waiting for file watch event");
        match event {
            Some(WatchEvent::SourceChanged(path)) => {
                assert_eq!(path.file_name().unwrap(), "page.tsx")
            }
            other => panic!("Expected SourceChanged, got {other:?}"),
        }
    }
}
