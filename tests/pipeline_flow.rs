use crossbeam_channel::{Receiver, unbounded};
use ocr_relay::config::{Poller, Tool};
use ocr_relay::orchestrator::{Orchestrator, PipelineEvent};
use ocr_relay::supervisor::{FaultReason, OcrSupervisor, ScriptedProbe};
use ocr_relay::watcher::{WatcherEvent, scan_existing};
use std::path::Path;
use tempfile::TempDir;

struct Harness {
    orch: Orchestrator,
    _rx: Receiver<PipelineEvent>,
    watch: TempDir,
    out: TempDir,
}

/// Builds an orchestrator wired to a scripted probe and a poller that
/// never ticks, so tests drive every transition through `handle_event`.
fn harness(tool: Tool) -> Harness {
    let watch = TempDir::new().expect("watch dir");
    let out = TempDir::new().expect("out dir");
    let (tx, rx) = unbounded();
    let supervisor = OcrSupervisor::new(
        tool,
        Poller {
            interval_ms: 3_600_000,
            ..Poller::default()
        },
        tx,
        ScriptedProbe::factory(vec![]),
    );
    let orch = Orchestrator::new(
        watch.path().to_path_buf(),
        out.path().to_path_buf(),
        None,
        supervisor,
    );
    Harness {
        orch,
        _rx: rx,
        watch,
        out,
    }
}

#[cfg(unix)]
fn harmless_tool() -> Tool {
    Tool {
        executable: "sleep".into(),
        send_args: vec!["5".into()],
        temp_subdir: format!("ocr-relay-test-{}", std::process::id()),
        ..Tool::default()
    }
}

fn broken_tool() -> Tool {
    Tool {
        executable: "/nonexistent/ocr-relay-no-such-tool".into(),
        ..Tool::default()
    }
}

fn touch(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdir");
    }
    std::fs::write(path, contents).expect("write");
}

// Scenario A: one discovered file, completion hand-off, relocated output.
#[cfg(unix)]
#[test]
fn scan_convert_and_relocate() {
    let mut h = harness(harmless_tool());
    let source = h.watch.path().join("a.pdf");
    touch(&source, "source");

    let snapshot = scan_existing(h.watch.path(), &[".pdf".to_string()]);
    assert_eq!(snapshot, vec![source.clone()]);
    h.orch.handle_event(PipelineEvent::InitialScan(snapshot));

    let status = h.orch.status();
    assert_eq!(status.current, Some(source));
    assert_eq!(status.remaining, 0);

    let temp = TempDir::new().expect("temp");
    let handed_off = temp.path().join("tmpAb12.pdf");
    touch(&handed_off, "converted");
    h.orch.handle_event(PipelineEvent::Completed(handed_off.clone()));

    let out_file = h.out.path().join("a.pdf");
    assert_eq!(std::fs::read_to_string(&out_file).expect("output"), "converted");
    assert!(!handed_off.exists());

    let status = h.orch.status();
    assert_eq!(status.processed, 1);
    assert_eq!(status.skipped, 0);
    assert_eq!(status.current, None);
    assert!(status.errors.is_empty());
}

// Scenario B: output already present, so the tool is never launched.
#[test]
fn existing_output_is_skipped() {
    let mut h = harness(broken_tool());
    let source = h.watch.path().join("a.pdf");
    touch(&source, "source");
    touch(&h.out.path().join("a.pdf"), "previous run");

    h.orch
        .handle_event(PipelineEvent::InitialScan(vec![source]));

    let status = h.orch.status();
    assert_eq!(status.skipped, 1);
    assert_eq!(status.processed, 0);
    assert_eq!(status.current, None);
    // A launch attempt would have recorded an error for the broken tool.
    assert!(status.errors.is_empty());
}

// Scenario C: a matched failure phrase abandons the job and moves on.
#[cfg(unix)]
#[test]
fn fault_is_logged_and_the_next_job_starts() {
    let mut h = harness(harmless_tool());
    let a = h.watch.path().join("a.pdf");
    let b = h.watch.path().join("b.pdf");
    touch(&a, "a");
    touch(&b, "b");

    h.orch
        .handle_event(PipelineEvent::InitialScan(vec![a.clone(), b.clone()]));
    assert_eq!(h.orch.status().current, Some(a.clone()));

    h.orch.handle_event(PipelineEvent::Fault(FaultReason::PhraseMatched(
        "Process failed".into(),
    )));

    let status = h.orch.status();
    assert_eq!(status.processed, 1);
    assert_eq!(status.errors.len(), 1);
    assert_eq!(status.errors[0].source, a);
    assert!(status.errors[0].reason.contains("Process failed"));
    assert_eq!(status.current, Some(b));
}

// Scenario D: a file arriving mid-job waits its turn.
#[cfg(unix)]
#[test]
fn file_created_during_a_job_is_queued_not_started() {
    let mut h = harness(harmless_tool());
    let a = h.watch.path().join("a.pdf");
    touch(&a, "a");
    h.orch
        .handle_event(PipelineEvent::InitialScan(vec![a.clone()]));

    let b = h.watch.path().join("b.tiff");
    touch(&b, "b");
    h.orch
        .handle_event(PipelineEvent::Watch(WatcherEvent::Created(b.clone())));

    let status = h.orch.status();
    assert_eq!(status.current, Some(a));
    assert_eq!(status.remaining, 1);

    let temp = TempDir::new().expect("temp");
    let handed_off = temp.path().join("tmpCd34.pdf");
    touch(&handed_off, "converted");
    h.orch.handle_event(PipelineEvent::Completed(handed_off));

    let status = h.orch.status();
    assert_eq!(status.current, Some(b));
    assert_eq!(status.remaining, 0);
}

#[cfg(unix)]
#[test]
fn created_event_for_queued_or_in_flight_path_is_idempotent() {
    let mut h = harness(harmless_tool());
    let a = h.watch.path().join("a.pdf");
    let b = h.watch.path().join("b.pdf");
    touch(&a, "a");
    touch(&b, "b");
    h.orch
        .handle_event(PipelineEvent::InitialScan(vec![a.clone(), b.clone()]));

    // a is in flight, b is pending; neither may be queued again.
    h.orch
        .handle_event(PipelineEvent::Watch(WatcherEvent::Created(a.clone())));
    h.orch
        .handle_event(PipelineEvent::Watch(WatcherEvent::Created(b.clone())));

    let status = h.orch.status();
    assert_eq!(status.current, Some(a));
    assert_eq!(status.remaining, 1);
}

#[cfg(unix)]
#[test]
fn deleted_event_removes_pending_and_ignores_absent() {
    let mut h = harness(harmless_tool());
    let a = h.watch.path().join("a.pdf");
    let b = h.watch.path().join("b.pdf");
    touch(&a, "a");
    touch(&b, "b");
    h.orch
        .handle_event(PipelineEvent::InitialScan(vec![a.clone(), b.clone()]));

    h.orch
        .handle_event(PipelineEvent::Watch(WatcherEvent::Deleted(b.clone())));
    assert_eq!(h.orch.status().remaining, 0);

    // Again, and for a path that was never queued: both no-ops.
    h.orch
        .handle_event(PipelineEvent::Watch(WatcherEvent::Deleted(b)));
    h.orch.handle_event(PipelineEvent::Watch(WatcherEvent::Deleted(
        h.watch.path().join("never-seen.pdf"),
    )));
    let status = h.orch.status();
    assert_eq!(status.remaining, 0);
    assert_eq!(status.current, Some(a));
}

#[test]
fn all_skippable_queue_drains_to_empty() {
    let mut h = harness(broken_tool());
    let mut sources = Vec::new();
    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        let source = h.watch.path().join(name);
        touch(&source, name);
        touch(&h.out.path().join(Path::new(name)), "done");
        sources.push(source);
    }

    h.orch.handle_event(PipelineEvent::InitialScan(sources));

    let status = h.orch.status();
    assert_eq!(status.skipped, 3);
    assert_eq!(status.processed, 0);
    assert_eq!(status.remaining, 0);
    assert_eq!(status.current, None);
}

#[test]
fn launch_failure_is_recorded_and_the_queue_advances() {
    let mut h = harness(broken_tool());
    let a = h.watch.path().join("a.pdf");
    touch(&a, "a");

    h.orch
        .handle_event(PipelineEvent::InitialScan(vec![a.clone()]));

    let status = h.orch.status();
    assert_eq!(status.current, None);
    assert_eq!(status.processed, 1);
    assert_eq!(status.errors.len(), 1);
    assert_eq!(status.errors[0].source, a);
    assert!(status.errors[0].reason.contains("launch failed"));
}

#[test]
fn stray_completion_with_no_job_is_dropped() {
    let mut h = harness(broken_tool());
    let temp = TempDir::new().expect("temp");
    let stray = temp.path().join("tmpZz99.pdf");
    touch(&stray, "stray");

    h.orch.handle_event(PipelineEvent::Completed(stray.clone()));

    let status = h.orch.status();
    assert_eq!(status.processed, 0);
    assert!(stray.exists());
}
