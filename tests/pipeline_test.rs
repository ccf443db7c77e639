//! End-to-end tests for the event pipeline: feed lines through the router
//! into an in-memory sink.

use notify_monitor::collector::parse_line;
use notify_monitor::device::AppInfo;
use notify_monitor::{
    ClickEvent, DeviceInfo, EventRouter, MemorySink, NotificationEvent, PayloadNormalizer,
    RawEvent, RouteOutcome, StaticAppDirectory, TextChangedEvent, TextOrigin, TypedTextTracker,
    UiNode, UiWindow,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn directory() -> StaticAppDirectory {
    let mut apps = StaticAppDirectory::default();
    apps.insert(
        "com.whatsapp",
        AppInfo {
            label: "WhatsApp".to_string(),
            version: Some("2.24.1".to_string()),
        },
    );
    apps
}

fn pipeline() -> (EventRouter, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let normalizer = PayloadNormalizer::new(
        DeviceInfo::new("device-1", "Pixel 8", "14"),
        Arc::new(directory()),
    );
    let router = EventRouter::new(normalizer, Arc::new(TypedTextTracker::new()), sink.clone());
    (router, sink)
}

fn send_button() -> UiNode {
    UiNode::default()
        .with_resource_id("com.whatsapp:id/send")
        .with_class("android.widget.ImageButton")
}

#[test]
fn test_typed_text_is_sent_exactly_once() {
    let (router, sink) = pipeline();

    router.handle(&RawEvent::TextChanged(TextChangedEvent::new(
        "com.whatsapp",
        "  see you at 8  ",
    )));
    let first = router.handle(&RawEvent::ViewClicked(ClickEvent::new(
        "com.whatsapp",
        send_button(),
    )));
    let second = router.handle(&RawEvent::ViewClicked(ClickEvent::new(
        "com.whatsapp",
        send_button(),
    )));

    assert_eq!(first, RouteOutcome::OutgoingDetected(TextOrigin::Tracked));
    assert_eq!(second, RouteOutcome::SendWithoutText);

    let records = sink.drain();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.message, "see you at 8");
    assert_eq!(record.app_name, "WhatsApp");
    assert_eq!(record.app_version, "2.24.1");
    assert!(record.is_outgoing);
    assert_eq!(record.message_type, "text");
    assert_eq!(record.raw("detected_by"), Some("accessibility"));
}

#[test]
fn test_text_is_scoped_per_app() {
    let (router, sink) = pipeline();

    router.handle(&RawEvent::TextChanged(TextChangedEvent::new(
        "com.whatsapp",
        "for whatsapp",
    )));
    let outcome = router.handle(&RawEvent::ViewClicked(ClickEvent::new(
        "org.telegram",
        UiNode::default().with_description("Send"),
    )));

    assert_eq!(outcome, RouteOutcome::SendWithoutText);
    assert!(sink.is_empty());
    assert_eq!(
        router.tracker().peek("com.whatsapp").as_deref(),
        Some("for whatsapp")
    );
}

#[test]
fn test_screen_fallback_reads_focused_field() {
    let (router, sink) = pipeline();

    let editor = UiNode::default()
        .with_class("android.widget.EditText")
        .with_text("typed before monitoring")
        .focused();
    let click = ClickEvent::new("com.whatsapp", send_button()).with_windows(vec![
        UiWindow::default(),
        UiWindow::new(UiNode::default().with_child(editor)),
    ]);

    let outcome = router.handle(&RawEvent::ViewClicked(click));

    assert_eq!(outcome, RouteOutcome::OutgoingDetected(TextOrigin::Screen));
    assert_eq!(sink.drain()[0].message, "typed before monitoring");
}

#[test]
fn test_empty_focused_field_does_not_borrow_other_window_text() {
    let (router, sink) = pipeline();

    let empty_editor = UiNode::default()
        .with_class("android.widget.EditText")
        .with_text("")
        .focused();
    let other_editor = UiNode::default()
        .with_class("android.widget.EditText")
        .with_text("unrelated draft")
        .focused();
    let click = ClickEvent::new("com.whatsapp", send_button()).with_windows(vec![
        UiWindow::new(empty_editor),
        UiWindow::new(other_editor),
    ]);

    assert_eq!(
        router.handle(&RawEvent::ViewClicked(click)),
        RouteOutcome::SendWithoutText
    );
    assert!(sink.is_empty());
}

#[test]
fn test_send_without_text_or_windows_emits_nothing() {
    let (router, sink) = pipeline();

    let outcome = router.handle(&RawEvent::ViewClicked(ClickEvent::new(
        "com.whatsapp",
        send_button(),
    )));

    assert_eq!(outcome, RouteOutcome::SendWithoutText);
    assert!(sink.is_empty());
}

#[test]
fn test_non_send_click_keeps_tracked_text() {
    let (router, sink) = pipeline();

    router.handle(&RawEvent::TextChanged(TextChangedEvent::new(
        "com.whatsapp",
        "draft",
    )));
    let outcome = router.handle(&RawEvent::ViewClicked(ClickEvent::new(
        "com.whatsapp",
        UiNode::default().with_resource_id("com.whatsapp:id/attach"),
    )));

    assert_eq!(outcome, RouteOutcome::ClickIgnored);
    assert!(sink.is_empty());
    assert_eq!(router.tracker().peek("com.whatsapp").as_deref(), Some("draft"));
}

#[test]
fn test_notification_message_fallbacks() {
    let (router, sink) = pipeline();

    router.handle(&RawEvent::Notification(
        NotificationEvent::new("com.whatsapp", 1_700_000_000_000)
            .with_extra("android.title", "Team")
            .with_extra("android.textLines", serde_json::json!(["Ann: hi", "Bo: yo"])),
    ));
    router.handle(&RawEvent::Notification(
        NotificationEvent::new("com.mail", 1_700_000_000_000)
            .with_extra("android.bigText", "Long body"),
    ));
    router.handle(&RawEvent::Notification(NotificationEvent::new(
        "com.empty",
        1_700_000_000_000,
    )));

    let records = sink.drain();
    assert_eq!(records.len(), 3);

    assert_eq!(records[0].message, "Ann: hi\nBo: yo");
    assert_eq!(records[0].title.as_deref(), Some("Team"));
    assert!(!records[0].is_outgoing);

    assert_eq!(records[1].message, "Long body");
    assert_eq!(records[1].app_name, "com.mail");
    assert_eq!(records[1].app_version, "unknown");
    assert_eq!(records[1].title.as_deref(), Some(""));

    assert_eq!(records[2].message, "");
}

#[test]
fn test_normalizing_twice_is_identical() {
    let normalizer = PayloadNormalizer::new(
        DeviceInfo::new("device-1", "Pixel 8", "14"),
        Arc::new(directory()),
    );
    let event = NotificationEvent::new("com.whatsapp", 1_700_000_000_000)
        .with_extra("android.title", "Bob")
        .with_extra("android.text", "hello")
        .with_extra("android.showWhen", true);

    assert_eq!(normalizer.normalize(&event), normalizer.normalize(&event));
}

#[test]
fn test_feed_lines_drive_router() {
    let (router, sink) = pipeline();

    let lines = [
        r#"{"type":"notification","package":"com.whatsapp","post_time":1700000000000,"extras":{"android.title":"Bob","android.text":"lunch?"}}"#,
        r#"{"type":"text_changed","package":"com.whatsapp","text":"sure"}"#,
        r#"{"type":"window_state_changed","package":"com.whatsapp"}"#,
        r#"{"type":"view_clicked","package":"com.whatsapp","timestamp":1700000060000,"node":{"resource_id":"com.whatsapp:id/send"}}"#,
    ];

    let outcomes: Vec<RouteOutcome> = lines
        .iter()
        .filter_map(|line| parse_line(line))
        .map(|event| router.handle(&event))
        .collect();

    assert_eq!(
        outcomes,
        vec![
            RouteOutcome::NotificationForwarded,
            RouteOutcome::TextTracked,
            RouteOutcome::Unsupported,
            RouteOutcome::OutgoingDetected(TextOrigin::Tracked),
        ]
    );

    let records = sink.drain();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].message, "lunch?");
    assert_eq!(records[1].message, "sure");
    assert_eq!(records[1].raw("timestamp"), Some("1700000060000"));
}
