//! Progress markers and the wire events streamed to the button script
//!
//! Every event is one SSE frame: `event: {name}\ndata: {json}\n\n`. The four
//! event names are `reset`, `progress_report`, `transition_speed` and
//! `download_ready`.

use axum::response::sse::Event as SseEvent;
use serde::Serialize;
use std::time::Duration;

use crate::error::Result;
use crate::types::{CachePolicy, ManifestItem};

/// A stage label and a percent-complete, either of which may be absent
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressMarker {
    stage: Option<String>,
    percent_complete: Option<f64>,
}

impl ProgressMarker {
    /// Build a marker. Empty stages count as absent, percentages are clamped to
    /// `[0, 100]` and NaN counts as absent.
    pub fn new(stage: Option<&str>, percent_complete: Option<f64>) -> Self {
        Self {
            stage: stage.filter(|s| !s.is_empty()).map(str::to_string),
            percent_complete: percent_complete
                .filter(|p| !p.is_nan())
                .map(|p| p.clamp(0.0, 100.0)),
        }
    }

    /// Stage label with no percentage
    pub fn stage(stage: &str) -> Self {
        Self::new(Some(stage), None)
    }

    /// Stage label with a percentage
    pub fn at(stage: &str, percent_complete: f64) -> Self {
        Self::new(Some(stage), Some(percent_complete))
    }

    /// Percentage with no stage label
    pub fn percent(percent_complete: f64) -> Self {
        Self::new(None, Some(percent_complete))
    }

    /// The stage label, if any
    pub fn stage_label(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    /// The clamped percentage, if any
    pub fn percent_complete(&self) -> Option<f64> {
        self.percent_complete
    }

    /// Display text: `"{stage}: {percent}%"`, or whichever half is present
    pub fn text(&self) -> String {
        progress_text(self.stage.as_deref(), self.percent_complete)
    }
}

/// Derive the progress bar text from a stage and a percentage
///
/// The percentage is rounded to the nearest integer. When either part is
/// missing the `": "` separator is dropped with it.
pub fn progress_text(stage: Option<&str>, percent_complete: Option<f64>) -> String {
    let stage = stage.filter(|s| !s.is_empty());
    let percent = percent_complete.map(|p| format!("{:.0}%", p.round()));

    match (stage, percent) {
        (Some(stage), Some(percent)) => format!("{stage}: {percent}"),
        (Some(stage), None) => stage.to_string(),
        (None, Some(percent)) => percent,
        (None, None) => String::new(),
    }
}

/// Format a transition duration as a CSS duration literal, in seconds rounded to
/// milliseconds (`"0s"`, `"0.35s"`, `"0.5s"`)
pub fn css_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis == 0 {
        return "0s".to_string();
    }
    let secs = millis as f64 / 1000.0;
    format!("{secs}s")
}

/// Payload of the terminal `download_ready` event
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DownloadReady {
    /// Completion message, empty when the button has none
    pub text: String,
    /// 100 when a completion message is shown, otherwise null
    #[serde(rename = "percentComplete")]
    pub percent_complete: Option<f64>,
    /// Everything the client should fetch and save
    pub downloads: Vec<ManifestItem>,
    /// Fetch cache mode for the downloads
    pub cache: CachePolicy,
    /// Where to send the browser once the downloads are saved
    pub callback: Option<String>,
}

impl DownloadReady {
    /// Build the ready payload; the message is shown at 100% when present
    pub fn new(
        message: Option<&str>,
        downloads: Vec<ManifestItem>,
        cache: CachePolicy,
        callback: Option<String>,
    ) -> Self {
        let message = message.filter(|m| !m.is_empty());
        let percent_complete = message.map(|_| 100.0);
        Self {
            text: progress_text(message, percent_complete),
            percent_complete,
            downloads,
            cache,
            callback,
        }
    }
}

/// A single named event on the file-creation stream
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WireEvent {
    /// Replace the whole progress bar markup
    Reset {
        /// Freshly rendered progress bar
        html: String,
    },
    /// Incremental text/width update
    ProgressReport {
        /// Display text
        text: String,
        /// Bar width, or null for a label-only update
        #[serde(rename = "percentComplete")]
        percent_complete: Option<f64>,
    },
    /// CSS transition duration for the next width change
    TransitionSpeed {
        /// CSS duration literal, e.g. `"0.35s"`
        speed: String,
    },
    /// Terminal event: the manifest is ready
    DownloadReady(DownloadReady),
}

impl WireEvent {
    /// Incremental update for a marker
    pub fn progress_report(marker: &ProgressMarker) -> Self {
        WireEvent::ProgressReport {
            text: marker.text(),
            percent_complete: marker.percent_complete(),
        }
    }

    /// Transition-speed hint for a duration
    pub fn transition_speed(duration: Duration) -> Self {
        WireEvent::TransitionSpeed {
            speed: css_duration(duration),
        }
    }

    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            WireEvent::Reset { .. } => "reset",
            WireEvent::ProgressReport { .. } => "progress_report",
            WireEvent::TransitionSpeed { .. } => "transition_speed",
            WireEvent::DownloadReady(_) => "download_ready",
        }
    }

    /// JSON payload
    pub fn data(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The complete SSE frame
    pub fn frame(&self) -> Result<String> {
        Ok(format!("event: {}\ndata: {}\n\n", self.name(), self.data()?))
    }

    /// Convert for axum's SSE response
    pub fn to_sse(&self) -> Result<SseEvent> {
        Ok(SseEvent::default().event(self.name()).data(self.data()?))
    }

    /// Whether this is the terminal `download_ready` event
    pub fn is_ready(&self) -> bool {
        matches!(self, WireEvent::DownloadReady(_))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_with_stage_and_percent() {
        assert_eq!(progress_text(Some("Zipping"), Some(42.4)), "Zipping: 42%");
        assert_eq!(progress_text(Some("Zipping"), Some(0.0)), "Zipping: 0%");
        assert_eq!(progress_text(Some("Zipping"), Some(100.0)), "Zipping: 100%");
        assert_eq!(progress_text(Some("Zipping"), Some(66.6)), "Zipping: 67%");
    }

    #[test]
    fn text_with_stage_only_has_no_separator() {
        assert_eq!(progress_text(Some("Zipping"), None), "Zipping");
    }

    #[test]
    fn text_with_percent_only_has_no_separator() {
        assert_eq!(progress_text(None, Some(33.3)), "33%");
        assert_eq!(progress_text(None, Some(0.0)), "0%");
        assert_eq!(progress_text(None, Some(100.0)), "100%");
    }

    #[test]
    fn text_with_nothing_is_empty() {
        assert_eq!(progress_text(None, None), "");
        assert_eq!(progress_text(Some(""), None), "");
    }

    #[test]
    fn marker_clamps_percent() {
        assert_eq!(ProgressMarker::percent(140.0).percent_complete(), Some(100.0));
        assert_eq!(ProgressMarker::percent(-5.0).percent_complete(), Some(0.0));
        assert_eq!(ProgressMarker::new(Some("x"), Some(f64::NAN)).percent_complete(), None);
        assert_eq!(ProgressMarker::at("Copying", 250.0).text(), "Copying: 100%");
    }

    #[test]
    fn css_duration_literals() {
        assert_eq!(css_duration(Duration::ZERO), "0s");
        assert_eq!(css_duration(Duration::from_millis(350)), "0.35s");
        assert_eq!(css_duration(Duration::from_millis(500)), "0.5s");
        assert_eq!(css_duration(Duration::from_micros(120_400)), "0.12s");
    }

    #[test]
    fn progress_report_frame() {
        let event = WireEvent::progress_report(&ProgressMarker::at("Creating File 1", 50.0));
        assert_eq!(
            event.frame().unwrap(),
            "event: progress_report\ndata: {\"text\":\"Creating File 1: 50%\",\"percentComplete\":50.0}\n\n"
        );
    }

    #[test]
    fn label_only_report_has_null_percent() {
        let event = WireEvent::progress_report(&ProgressMarker::stage("Preparing"));
        let payload: serde_json::Value = serde_json::from_str(&event.data().unwrap()).unwrap();
        assert_eq!(payload["text"], "Preparing");
        assert!(payload["percentComplete"].is_null());
    }

    #[test]
    fn transition_speed_frame() {
        let event = WireEvent::transition_speed(Duration::from_millis(350));
        assert_eq!(event.name(), "transition_speed");
        assert_eq!(
            event.frame().unwrap(),
            "event: transition_speed\ndata: {\"speed\":\"0.35s\"}\n\n"
        );
    }

    #[test]
    fn ready_without_message_has_no_text_or_percent() {
        let ready = DownloadReady::new(
            None,
            vec![ManifestItem::new("https://host/a.txt", "a.txt")],
            CachePolicy::NoStore,
            None,
        );
        let payload = serde_json::to_value(WireEvent::DownloadReady(ready)).unwrap();

        assert_eq!(payload["text"], "");
        assert!(payload["percentComplete"].is_null());
        assert_eq!(payload["cache"], "no-store");
        assert!(payload["callback"].is_null());
        assert_eq!(
            payload["downloads"],
            serde_json::json!([{"url": "https://host/a.txt", "filename": "a.txt"}])
        );
    }

    #[test]
    fn ready_with_message_is_complete() {
        let ready = DownloadReady::new(
            Some("Download Complete"),
            vec![],
            CachePolicy::Default,
            Some("/download-success".into()),
        );
        assert_eq!(ready.text, "Download Complete: 100%");
        assert_eq!(ready.percent_complete, Some(100.0));

        let event = WireEvent::DownloadReady(ready);
        assert!(event.is_ready());
        assert!(event.frame().unwrap().starts_with("event: download_ready\ndata: "));
    }
}
