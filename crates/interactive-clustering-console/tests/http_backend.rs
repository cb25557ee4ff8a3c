use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use interactive_clustering_console::Error;
use interactive_clustering_console::client::{CommandClient, HttpBackend, StatusClient};
use interactive_clustering_console::commands::{PipelineCommand, run_command};
use interactive_clustering_console::scheduler::{PollingScheduler, SchedulerState};
use interactive_clustering_console::sink::RecordingSink;

/// Answers each accepted connection with the next scripted `(code, body)` and
/// hands back the raw request heads it saw.
fn spawn_scripted_server(
    responses: Vec<(u16, String)>,
) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (code, body) in responses {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut buf = [0u8; 8192];
            let n = stream.read(&mut buf).expect("read request");
            seen.push(String::from_utf8_lossy(&buf[..n]).to_string());
            let hdr = format!(
                "HTTP/1.1 {code} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(hdr.as_bytes()).expect("write hdr");
            stream.write_all(body.as_bytes()).expect("write body");
        }
        seen
    });
    (format!("http://{addr}"), handle)
}

fn status_body(iteration: u32, state: &str, task: Option<(u8, &str)>) -> String {
    let task = match task {
        Some((p, d)) => serde_json::json!({"progression": p, "detail": d}),
        None => serde_json::Value::Null,
    };
    serde_json::json!({
        "project_id": "demo",
        "status": {
            "iteration_id": iteration,
            "state": state,
            "task": task,
            "state_details": {},
        }
    })
    .to_string()
}

fn backend(base: &str, token: Option<&str>) -> HttpBackend {
    HttpBackend::new(base, token.map(str::to_string), Duration::from_secs(5)).unwrap()
}

#[test]
fn fetch_decodes_status_and_sends_bearer_token() {
    let (base, server) = spawn_scripted_server(vec![(
        200,
        status_body(3, "CLUSTERING_WORKING", Some((40, "running"))),
    )]);
    let mut client = backend(&base, Some("s3cret"));
    let snapshot = client.fetch("demo").unwrap();
    assert_eq!(snapshot.iteration_id, 3);
    assert_eq!(snapshot.state, "CLUSTERING_WORKING");
    assert_eq!(snapshot.project_id.as_deref(), Some("demo"));
    let task = snapshot.task.unwrap();
    assert_eq!(task.progression, Some(40));
    assert_eq!(task.detail.as_deref(), Some("running"));

    let requests = server.join().unwrap();
    let head = requests[0].to_ascii_lowercase();
    assert!(head.starts_with("get /api/projects/demo/status "), "{head}");
    assert!(head.contains("authorization: bearer s3cret"), "{head}");
}

#[test]
fn non_ok_status_is_a_protocol_error_with_detail() {
    let (base, server) = spawn_scripted_server(vec![(
        404,
        r#"{"detail": "The project with id 'demo' doesn't exist."}"#.to_string(),
    )]);
    let err = backend(&base, None).fetch("demo").unwrap_err();
    assert!(err.is_protocol(), "{err}");
    let msg = err.to_string();
    assert!(msg.contains("404") && msg.contains("doesn't exist"), "{msg}");
    server.join().unwrap();
}

#[test]
fn malformed_body_is_a_protocol_error() {
    let (base, server) = spawn_scripted_server(vec![(200, "<html>oops</html>".to_string())]);
    let err = backend(&base, None).fetch("demo").unwrap_err();
    assert!(err.is_protocol(), "{err}");
    server.join().unwrap();
}

#[test]
fn unreachable_backend_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = backend(&format!("http://{addr}"), None)
        .fetch("demo")
        .unwrap_err();
    assert!(err.is_transport(), "{err}");
}

#[test]
fn commands_post_to_their_endpoint() {
    let (base, server) = spawn_scripted_server(vec![
        (202, "{}".to_string()),
        (409, r#"{"detail": "The project must be at iteration end."}"#.to_string()),
    ]);
    let mut client = backend(&base, None);
    let reply = client
        .post_command("demo", PipelineCommand::Sampling)
        .unwrap();
    assert_eq!(reply.status, 202);

    let mut sink = RecordingSink::new();
    let err = run_command(&mut client, &mut sink, "demo", PipelineCommand::NextIteration)
        .unwrap_err();
    match err {
        Error::Application { code, detail } => {
            assert_eq!(code, 409);
            assert_eq!(detail, "The project must be at iteration end.");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sink.reloads(), 1);

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("POST /api/projects/demo/sampling "));
    assert!(requests[1].starts_with("POST /api/projects/demo/iterations "));
}

#[test]
fn watch_loop_follows_a_job_to_completion() {
    let (base, server) = spawn_scripted_server(vec![
        (200, status_body(1, "SAMPLING_PENDING", None)),
        (200, status_body(1, "SAMPLING_WORKING", Some((60, "sampling")))),
        (200, status_body(1, "ANNOTATION_WITH_UPTODATE_MODELIZATION", None)),
        (200, status_body(1, "ANNOTATION_WITH_UPTODATE_MODELIZATION", None)),
    ]);
    let mut client = backend(&base, None);
    let mut sink = RecordingSink::new();
    let alive = Arc::new(AtomicBool::new(true));
    let mut scheduler = PollingScheduler::new(Duration::from_millis(5), alive);

    let last = scheduler
        .run_blocking("demo", &mut client, &mut sink)
        .unwrap()
        .unwrap();
    assert_eq!(last.snapshot.state, "ANNOTATION_WITH_UPTODATE_MODELIZATION");
    assert!(!last.rescheduled);
    assert_eq!(sink.reloads(), 1);
    assert!(sink.errors.is_empty());
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(server.join().unwrap().len(), 4);
}

#[test]
fn watch_loop_stops_on_first_failure() {
    let (base, server) = spawn_scripted_server(vec![
        (200, status_body(2, "CLUSTERING_WORKING", Some((10, "fit")))),
        (500, r#"{"detail": "boom"}"#.to_string()),
    ]);
    let mut client = backend(&base, None);
    let mut sink = RecordingSink::new();
    let alive = Arc::new(AtomicBool::new(true));
    let mut scheduler = PollingScheduler::new(Duration::from_millis(5), alive);

    let err = scheduler
        .run_blocking("demo", &mut client, &mut sink)
        .unwrap_err();
    assert!(err.is_protocol(), "{err}");
    assert_eq!(sink.errors.len(), 1);
    assert_eq!(scheduler.pending(), None);
    assert_eq!(server.join().unwrap().len(), 2);
}
