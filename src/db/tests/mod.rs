use crate::button::{NewButton, RenderConfig};
use crate::config::RenderDefaults;
use crate::types::{CachePolicy, DownloadEntry};


fn new_button(class_name: &str, lookup_key: Option<&str>) -> NewButton {
    let defaults = RenderDefaults::default();
    NewButton {
        class_name: class_name.to_string(),
        lookup_key: lookup_key.map(str::to_string),
        button: RenderConfig {
            text: "Download files".to_string(),
            ..defaults.button
        },
        progress: defaults.progress,
        downloads: vec![DownloadEntry::named("https://host/a.txt", "a.txt")],
        download_message: Some("Download Complete".to_string()),
        cache: CachePolicy::Default,
        callback: None,
        form_id: Some("select-files".to_string()),
    }
}
