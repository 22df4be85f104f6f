mod common;

use common::{
    CEV_DATA, HOST, ID_351, ID_487E, MockRelay, NO_DATA, RecordingSink, Reply, SER_RECORDS, ScriptedPrompter,
    connected_session, relay_with_audit,
};
use sel_relay_lib::sink::CANCEL_MARKER;
use sel_relay_lib::workflow::EventDownload;
use sel_relay_lib::{DeviceModel, DownloadOutcome, DownloadReport, DownloadRequest, DownloadWorkflow, WorkflowConfig, WorkflowState};

fn request(ids: Option<&str>, samples: Option<&str>, cycles: Option<&str>) -> DownloadRequest {
    DownloadRequest {
        event_ids: ids.map(str::to_string),
        samples: samples.map(str::to_string),
        cycles: cycles.map(str::to_string),
    }
}

async fn workflow(relay: &MockRelay, answers: &[&str]) -> DownloadWorkflow<ScriptedPrompter, RecordingSink> {
    let session = connected_session(relay).await;
    DownloadWorkflow::new(
        session,
        ScriptedPrompter::new(answers),
        RecordingSink::default(),
        WorkflowConfig::default(),
    )
}

fn completed(outcome: DownloadOutcome) -> DownloadReport {
    match outcome {
        DownloadOutcome::Completed(report) => report,
        DownloadOutcome::Cancelled(reason) => panic!("cancelled: {reason}"),
    }
}

fn only_event(report: &DownloadReport) -> &EventDownload {
    assert_eq!(report.events.len(), 1);
    &report.events[0]
}

#[tokio::test(start_paused = true)]
async fn sel351_full_resolution_download() {
    let relay = relay_with_audit(ID_351);
    relay.always("SER 03/13/2024 03/14/2024", Reply::text(SER_RECORDS));
    relay.always("CEV R L10 3", Reply::text(CEV_DATA));
    let mut wf = workflow(&relay, &[]).await;

    let report = completed(wf.execute(request(Some("3"), Some("all"), Some("10"))).await.unwrap());
    assert_eq!(wf.state(), WorkflowState::Done);
    assert_eq!(report.model, DeviceModel::Sel311L351);
    assert_eq!(report.device_id.as_deref(), Some("FEEDER 12"));
    assert_eq!(report.history_commands, ["SER 03/13/2024 03/14/2024"]);

    let event = only_event(&report);
    assert!(event.succeeded);
    assert_eq!(event.command.as_deref(), Some("CEV R L10 3"));
    assert_eq!(event.artifact, "FEEDER 12_2024.03.14-09.05.07.042_BCG T_CEV R L10 3");

    let sink = wf.sink();
    assert!(sink.waveforms[&event.artifact].contains("\"IA\",\"IB\",\"IC\""));
    let audit = &sink.audits["his+ser_FEEDER 12_2024.03.14-09.05.07.042"];
    assert!(audit.starts_with(&format!("Connect IP: {HOST}\nCurrent computer time: ")));
    assert!(audit.contains("Level 1"));
    assert!(audit.contains("51G Asserted"));
    assert!(wf.prompter().questions.is_empty());

    let sent = relay.sent();
    let order = ["ID", "ACC", "PASS", "HIS", "CHI", "SER 03/13/2024 03/14/2024", "CEV R L10 3"];
    let mut positions = order.iter().map(|c| sent.iter().position(|s| s == c).unwrap());
    let mut last = positions.next().unwrap();
    for p in positions {
        assert!(p > last, "commands out of order: {sent:?}");
        last = p;
    }
}

#[tokio::test(start_paused = true)]
async fn sel487e_no_data_fails_without_prompting() {
    let relay = relay_with_audit(ID_487E);
    relay.always("SER 03/14/2024 03/15/2024", Reply::text(SER_RECORDS));
    relay.always("CEV 7", Reply::text(NO_DATA));
    let mut wf = workflow(&relay, &[]).await;

    let report = completed(wf.execute(request(Some("7"), Some("4"), Some("10"))).await.unwrap());
    assert_eq!(report.model, DeviceModel::Sel487E);

    let event = only_event(&report);
    assert!(!event.succeeded);
    assert_eq!(event.command.as_deref(), Some("CEV 7"));
    assert_eq!(relay.count_sent("CEV 7"), 1);
    assert!(wf.prompter().questions.is_empty());

    let sink = wf.sink();
    assert!(sink.waveforms.is_empty());
    let audit = &sink.audits["his+ser_BUS 2_2024.03.15-01.02.03.004"];
    assert!(audit.ends_with("\nFailed to download waveform file: BUS 2_2024.03.15-01.02.03.004_TRIP_CEV 7.cev"));
}

#[tokio::test(start_paused = true)]
async fn sel351_no_data_asks_for_shorter_capture() {
    let relay = relay_with_audit(ID_351);
    relay.always("SER 03/14/2024 03/15/2024", Reply::text(SER_RECORDS));
    relay.always("CEV L10 7", Reply::text(NO_DATA));
    relay.always("CEV L5 7", Reply::text(CEV_DATA));
    let mut wf = workflow(&relay, &["0", "5"]).await;

    let report = completed(wf.execute(request(Some("7"), Some("4"), Some("10"))).await.unwrap());
    let event = only_event(&report);
    assert!(event.succeeded);
    assert_eq!(event.cycles, 5);
    assert_eq!(event.command.as_deref(), Some("CEV L5 7"));
    assert_eq!(wf.prompter().questions.len(), 2);
    assert!(wf.prompter().shown.iter().any(|m| m.contains("No Data Available")));
}

#[tokio::test(start_paused = true)]
async fn narrowed_cycles_carry_forward() {
    let relay = relay_with_audit(ID_351);
    relay.always("SER 03/13/2024 03/14/2024", Reply::text(SER_RECORDS));
    relay.always("CEV L30 3", Reply::text(NO_DATA));
    relay.always("CEV L15 3", Reply::text(CEV_DATA));
    relay.always("CEV L15 4", Reply::text(CEV_DATA));
    let mut wf = workflow(&relay, &["15"]).await;

    let report = completed(wf.execute(request(Some("3,4"), Some("4"), Some("30"))).await.unwrap());
    assert_eq!(report.events.len(), 2);
    assert!(report.events.iter().all(|e| e.succeeded));
    assert_eq!(relay.count_sent("CEV L30 4"), 0);
    assert_eq!(relay.count_sent("CEV L15 4"), 1);
}

#[tokio::test(start_paused = true)]
async fn skipping_a_narrowed_event_keeps_the_batch_going() {
    let relay = relay_with_audit(ID_351);
    relay.always("SER 03/13/2024 03/14/2024", Reply::text(SER_RECORDS));
    relay.always("CEV L10 3", Reply::text(NO_DATA));
    relay.always("CEV L10 4", Reply::text(CEV_DATA));
    let mut wf = workflow(&relay, &["exit"]).await;

    let report = completed(wf.execute(request(Some("3-4"), Some("4"), Some("10"))).await.unwrap());
    let outcomes: Vec<(&str, bool)> = report
        .events
        .iter()
        .map(|e| (e.event.record_number.as_str(), e.succeeded))
        .collect();
    assert_eq!(outcomes, [("3", false), ("4", true)]);
    assert_eq!(report.failed_events().count(), 1);
}

#[tokio::test(start_paused = true)]
async fn history_window_is_fetched_once_per_date() {
    let relay = relay_with_audit(ID_351);
    relay.always("SER 03/13/2024 03/14/2024", Reply::text(SER_RECORDS));
    relay.always("SER 03/14/2024 03/15/2024", Reply::text(SER_RECORDS));
    relay.always("CEV L10 3", Reply::text(CEV_DATA));
    relay.always("CEV L10 4", Reply::text(CEV_DATA));
    relay.always("CEV L10 7", Reply::text(CEV_DATA));
    let mut wf = workflow(&relay, &[]).await;

    let report = completed(wf.execute(request(Some("3,4,7"), Some("4"), Some("10"))).await.unwrap());
    assert_eq!(relay.count_sent("SER 03/13/2024 03/14/2024"), 1);
    assert_eq!(relay.count_sent("SER 03/14/2024 03/15/2024"), 1);
    assert_eq!(relay.count_sent("SER 50"), 0);
    assert_eq!(report.history_commands.len(), 2);
    assert_eq!(report.events.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn invalid_history_window_falls_back_once() {
    let relay = relay_with_audit(ID_351);
    relay.always("SER 03/13/2024 03/14/2024", Reply::text("SER\r\nInvalid Date\r\n=>"));
    relay.always("SER 03/14/2024 03/15/2024", Reply::text("SER\r\nNo SER Data\r\n=>"));
    relay.always("SER 50", Reply::text(SER_RECORDS));
    relay.always("CEV L10 3", Reply::text(CEV_DATA));
    relay.always("CEV L10 7", Reply::text(CEV_DATA));
    let mut wf = workflow(&relay, &[]).await;

    let report = completed(wf.execute(request(Some("3,7"), Some("4"), Some("10"))).await.unwrap());
    assert_eq!(relay.count_sent("SER 50"), 1);
    assert_eq!(report.history_commands.last().map(String::as_str), Some("SER 50"));
}

#[tokio::test(start_paused = true)]
async fn interactive_selection_after_unknown_ids() {
    let relay = relay_with_audit(ID_351);
    relay.always("SER 03/13/2024 03/14/2024", Reply::text(SER_RECORDS));
    relay.always("CEV R L10 3", Reply::text(CEV_DATA));
    let mut wf = workflow(&relay, &["", "3-5", "3", "8", "all", "abc", "10"]).await;

    let report = completed(wf.execute(request(Some("42"), None, None)).await.unwrap());
    assert_eq!(only_event(&report).command.as_deref(), Some("CEV R L10 3"));

    let prompter = wf.prompter();
    assert_eq!(prompter.questions.len(), 7);
    assert!(prompter.shown[0].starts_with("REC_NUM"));
    assert!(prompter.shown.iter().any(|m| m.contains("Id Number 5 is not in the list")));
}

#[tokio::test(start_paused = true)]
async fn exit_at_event_selection_cancels() {
    let relay = relay_with_audit(ID_351);
    let mut wf = workflow(&relay, &["exit"]).await;

    let outcome = wf.execute(request(None, Some("4"), Some("10"))).await.unwrap();
    assert!(matches!(outcome, DownloadOutcome::Cancelled(_)));
    assert_eq!(wf.state(), WorkflowState::Cancelled);

    let cancellation = wf.sink().cancellation.as_deref().unwrap();
    assert!(cancellation.starts_with(&format!("Connect IP: {HOST}")));
    assert!(cancellation.ends_with(CANCEL_MARKER));
    assert!(relay.sent().iter().all(|c| !c.starts_with("CEV") && !c.starts_with("SER")));
}

#[tokio::test(start_paused = true)]
async fn exit_at_cycle_entry_cancels() {
    let relay = relay_with_audit(ID_351);
    let mut wf = workflow(&relay, &["EXIT"]).await;

    let outcome = wf.execute(request(Some("3"), Some("4"), Some("-2"))).await.unwrap();
    assert!(matches!(outcome, DownloadOutcome::Cancelled(_)));
    assert!(wf.sink().cancellation.is_some());
    assert!(wf.sink().audits.is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_event_table_downloads_nothing() {
    let relay = relay_with_audit(ID_351);
    relay.always("CHI", Reply::text("CHI\r\nInvalid Command\r\n=>"));
    let mut wf = workflow(&relay, &[]).await;

    let report = completed(wf.execute(request(Some("3"), Some("4"), Some("10"))).await.unwrap());
    assert!(report.events.is_empty());
    assert_eq!(report.audit_artifact, None);
    assert!(wf.prompter().questions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_session_once() {
    let relay = relay_with_audit(ID_351);
    let mut wf = workflow(&relay, &[]).await;

    wf.shutdown().await;
    wf.shutdown().await;
    assert_eq!(relay.count_sent("QUI"), 1);
    assert_eq!(relay.count_sent("EXIT"), 1);
    assert!(!wf.session().is_connected());
}

#[tokio::test(start_paused = true)]
async fn lost_waveform_reply_keeps_the_batch_going() {
    let relay = relay_with_audit(ID_351);
    relay.always("SER 03/13/2024 03/14/2024", Reply::text(SER_RECORDS));
    relay.always("CEV L10 3", Reply::silent());
    relay.always("CEV L10 4", Reply::text(CEV_DATA));
    let mut wf = workflow(&relay, &[]).await;

    let report = completed(wf.execute(request(Some("3,4"), Some("4"), Some("10"))).await.unwrap());
    let outcomes: Vec<(&str, bool, Option<&str>)> = report
        .events
        .iter()
        .map(|e| (e.event.record_number.as_str(), e.succeeded, e.command.as_deref()))
        .collect();
    assert_eq!(outcomes, [("3", false, Some("CEV L10 3")), ("4", true, Some("CEV L10 4"))]);
    assert!(wf.prompter().questions.is_empty());

    let audit_name = report.audit_artifact.as_deref().unwrap();
    let audit = &wf.sink().audits[audit_name];
    assert!(audit.contains("\nFailed to download waveform file: FEEDER 12_2024.03.14-09.05.07.042_BCG T_CEV L10 3.cev"));
    assert!(!audit.contains("CEV L10 4.cev"));
    assert_eq!(wf.sink().waveforms.len(), 1);
}
