//! Progress bar for the item currently being transferred.

use std::sync::Mutex;

use catalog_sync_core::PendingTransfer;
use catalog_sync_core::download::{TransferProgress, TransferState};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg:40!} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} ETA {eta}";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:40!} {bytes} {bytes_per_sec}";

/// One `indicatif` bar per transfer; hidden when not drawing to a terminal.
#[derive(Debug)]
pub(crate) struct BarProgress {
    visible: bool,
    current: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub(crate) fn new(visible: bool) -> Self {
        Self {
            visible,
            current: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.current.lock()
            && let Some(bar) = guard.as_ref()
        {
            f(bar);
        }
    }
}

fn build_bar(visible: bool, item: &PendingTransfer, state: &TransferState) -> ProgressBar {
    let bar = match (visible, state.expected_total_bytes) {
        (false, _) => ProgressBar::hidden(),
        (true, Some(total)) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        }
        (true, None) => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template(SPINNER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        }
    };
    bar.set_message(item.file_name.clone());
    bar.set_position(state.bytes_on_disk);
    bar
}

impl TransferProgress for BarProgress {
    fn started(&self, item: &PendingTransfer, state: &TransferState) {
        let bar = build_bar(self.visible, item, state);
        if let Ok(mut guard) = self.current.lock()
            && let Some(previous) = guard.replace(bar)
        {
            previous.finish_and_clear();
        }
    }

    fn advanced(&self, bytes: u64) {
        self.with_bar(|bar| bar.inc(bytes));
    }

    fn finished(&self) {
        if let Ok(mut guard) = self.current.lock()
            && let Some(bar) = guard.take()
        {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use catalog_sync_core::catalog::parse_publish_date;
    use catalog_sync_core::download::TransferMode;

    use super::*;

    fn item() -> PendingTransfer {
        PendingTransfer {
            id: 1,
            file_name: "clip.mp4".to_string(),
            published_at: parse_publish_date("2021-01-01 10:00:00").unwrap(),
            source_url: "https://cdn.example.com/clip_4000.mp4".to_string(),
            category: None,
        }
    }

    #[test]
    fn test_hidden_bar_tracks_position() {
        let progress = BarProgress::new(false);
        let state = TransferState {
            bytes_on_disk: 10,
            expected_total_bytes: Some(100),
            mode: TransferMode::Resuming,
        };
        progress.started(&item(), &state);
        progress.advanced(5);

        let position = progress
            .current
            .lock()
            .unwrap()
            .as_ref()
            .map(ProgressBar::position);
        assert_eq!(position, Some(15));

        progress.finished();
        assert!(progress.current.lock().unwrap().is_none());
    }

    #[test]
    fn test_events_without_start_are_ignored() {
        let progress = BarProgress::new(false);
        progress.advanced(5);
        progress.finished();
        assert!(progress.current.lock().unwrap().is_none());
    }
}
