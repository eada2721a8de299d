use super::*;
use crate::config::{RenderDefaults, SCRIPT_TEMPLATE};
use crate::render::TeraRenderer;

fn new_button(class_name: &str) -> NewButton {
    let defaults = RenderDefaults::default();
    NewButton {
        class_name: class_name.to_string(),
        lookup_key: None,
        button: defaults.button,
        progress: defaults.progress,
        downloads: Vec::new(),
        download_message: None,
        cache: CachePolicy::NoStore,
        callback: None,
        form_id: None,
    }
}

fn button() -> DownloadButton {
    DownloadButton::from_new(ButtonId(7), new_button("ZipDownloadBtn"))
}

#[test]
fn dom_ids_are_derived_from_class_and_identity() {
    let btn = button();
    assert_eq!(btn.dom_id("csrf"), "zip-download-btn-7-csrf");
    assert_eq!(btn.dom_id("progress"), "zip-download-btn-7-progress");
    assert_eq!(dom_id("DownloadBtn", ButtonId(1), "btn"), "download-btn-1-btn");
    assert_eq!(dom_id("my_btn", ButtonId(2), "btn"), "my-btn-2-btn");
}

#[test]
fn form_selector_defaults_to_the_only_form() {
    let mut btn = button();
    assert_eq!(btn.form_selector(), "form");

    btn.form_id = Some("select-files".into());
    assert_eq!(btn.form_selector(), "#select-files");
}

#[test]
fn overrides_win_and_styles_merge_per_property() {
    let base = RenderConfig {
        classes: vec!["btn".into()],
        style: BTreeMap::from([
            ("width".to_string(), "0%".to_string()),
            ("color".to_string(), "red".to_string()),
        ]),
        template: "a.html".into(),
        text: "Download".into(),
    };
    let overrides = RenderOverrides {
        style: Some(BTreeMap::from([("color".to_string(), "blue".to_string())])),
        text: Some("Get files".into()),
        ..Default::default()
    };

    let merged = base.merged(&overrides);
    assert_eq!(merged.classes, vec!["btn".to_string()]);
    assert_eq!(merged.style["width"], "0%");
    assert_eq!(merged.style["color"], "blue");
    assert_eq!(merged.text, "Get files");
    assert_eq!(merged.template, "a.html");
    assert_eq!(merged.style_attr(), "color: blue; width: 0%;");
}

#[test]
fn steps_take_the_next_free_index_and_tolerate_gaps() {
    let mut btn = button();
    assert_eq!(btn.add_file_creation_step("a", StepArgs::new()), 0);
    assert_eq!(btn.add_file_creation_step("b", StepArgs::new()), 1);
    assert_eq!(btn.add_file_creation_step("c", StepArgs::new()), 2);

    let removed = btn.remove_file_creation_step(1).unwrap();
    assert_eq!(removed.name, "b");
    assert!(btn.remove_file_creation_step(1).is_none());

    assert_eq!(btn.add_file_creation_step("d", StepArgs::new()), 3);
    let order: Vec<_> = btn.file_creation_steps().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(order, vec!["a", "c", "d"]);

    // Pipelines are independent
    assert_eq!(btn.add_form_handling_step("select", StepArgs::new()), 0);
    assert_eq!(btn.steps(crate::error::Pipeline::FormHandling).len(), 1);
}

#[test]
fn step_args_keep_positional_and_keyword_values() {
    let args = StepArgs::new()
        .arg("hello.txt")
        .arg(3)
        .kwarg("label", "Creating File 1");
    assert_eq!(args.get_str(0), Some("hello.txt"));
    assert_eq!(args.get(1).and_then(|v| v.as_u64()), Some(3));
    assert_eq!(args.get_kw_str("label"), Some("Creating File 1"));
    assert!(args.get(2).is_none());
}

#[test]
fn rendering_twice_yields_identical_markup() {
    let renderer = TeraRenderer::new().unwrap();
    let btn = button();

    let first = btn.render_button(&renderer).unwrap();
    let second = btn.render_button(&renderer).unwrap();
    assert_eq!(first, second);
    assert!(first.contains(r#"id="zip-download-btn-7-btn""#));
    assert!(first.contains("Download"));
}

#[test]
fn progress_container_is_hidden() {
    let renderer = TeraRenderer::new().unwrap();
    let html = button().render_progress_container(&renderer).unwrap();

    assert!(html.starts_with(r#"<div id="zip-download-btn-7-progress" style="display: none;">"#));
    assert!(html.contains(r#"id="zip-download-btn-7-progress-bar""#));
    assert!(html.ends_with("</div>"));
}

#[test]
fn reset_rewrites_text_and_width() {
    let renderer = TeraRenderer::new().unwrap();
    let mut btn = button();

    let event = btn.reset(&renderer, &ProgressMarker::at("Zipping", 40.0)).unwrap();
    assert_eq!(btn.progress.text, "Zipping: 40%");
    assert_eq!(btn.progress.style["width"], "40%");
    match event {
        WireEvent::Reset { html } => {
            assert!(html.contains("Zipping: 40%"));
            assert!(html.contains("width: 40%;"));
        }
        other => panic!("expected reset, got {other:?}"),
    }

    btn.reset(&renderer, &ProgressMarker::stage("Preparing")).unwrap();
    assert_eq!(btn.progress.style["width"], "0%");
    assert_eq!(btn.progress.text, "Preparing");
}

#[test]
fn script_embeds_identity_token_and_endpoints() {
    let renderer = TeraRenderer::new().unwrap();
    let mut btn = button();
    btn.form_id = Some("</script><b>".into());

    let script = btn
        .render_script(
            &renderer,
            &ScriptContext {
                csrf_token: "tok123",
                url_prefix: "/app/",
                template: SCRIPT_TEMPLATE,
            },
        )
        .unwrap();

    assert!(script.contains(r#""csrf_token":"tok123""#));
    assert!(script.contains(r#""cls":"ZipDownloadBtn""#));
    assert!(script.contains("/app/download-btn/create_files/7/ZipDownloadBtn"));
    assert!(!script.contains("</script><b>"));
}

#[test]
fn manifest_appends_transient_entries() {
    let mut btn = button();
    btn.downloads.push(DownloadEntry::named("https://host/a.txt", "a.txt"));
    btn.add_transient_download(("/download-btn/artifact/7/ZipDownloadBtn", "files.zip"));

    let manifest = btn.manifest().unwrap();
    assert_eq!(
        manifest,
        vec![
            ManifestItem::new("https://host/a.txt", "a.txt"),
            ManifestItem::new("/download-btn/artifact/7/ZipDownloadBtn", "files.zip"),
        ]
    );

    btn.clear_transient_downloads();
    assert_eq!(btn.manifest().unwrap().len(), 1);
}

#[test]
fn download_ready_carries_message_cache_and_callback() {
    let mut btn = button();
    btn.downloads.push(DownloadEntry::url("https://host/a.txt"));
    btn.download_message = Some("Download Complete".into());
    btn.callback = Some("/download-success".into());
    btn.cache = CachePolicy::Default;

    match btn.download_ready().unwrap() {
        WireEvent::DownloadReady(ready) => {
            assert_eq!(ready.text, "Download Complete: 100%");
            assert_eq!(ready.percent_complete, Some(100.0));
            assert_eq!(ready.downloads[0].filename, "download");
            assert_eq!(ready.cache, CachePolicy::Default);
            assert_eq!(ready.callback.as_deref(), Some("/download-success"));
        }
        other => panic!("expected download_ready, got {other:?}"),
    }
}
