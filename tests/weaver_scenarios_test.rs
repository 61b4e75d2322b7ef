//! End-to-end weaving scenarios: source in, wrappers and diagnostics out,
//! plus runtime semantics of the code paths the wrappers compile to.

use pretty_assertions::assert_eq;
use spanweave::rt::{self, FirstPoll, Status};
use spanweave::telemetry::{install_backend, NoopBackend, RecordingBackend};
use spanweave::{DiagnosticCode, ProgramSnapshot, Severity, ShapeVariant, WeaveOutput, Weaver};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn weave(source: &str) -> WeaveOutput {
    let snapshot =
        ProgramSnapshot::parse_files(vec![(PathBuf::from("src/demo.rs"), source.to_string())])
            .unwrap();
    Weaver::default().weave(&snapshot).unwrap()
}

// The backend slot is process-wide; runtime tests in this binary share it.
static BACKEND_LOCK: Mutex<()> = Mutex::new(());

fn with_backend<R>(f: impl FnOnce(&RecordingBackend) -> R) -> R {
    let _guard = BACKEND_LOCK.lock().unwrap();
    let backend = RecordingBackend::new();
    install_backend(Arc::new(backend.clone()));
    let result = f(&backend);
    install_backend(Arc::new(NoopBackend));
    result
}

struct Outcome {
    ok: bool,
}

fn is_failure(outcome: &Outcome) -> bool {
    !outcome.ok
}

#[test]
fn successful_outcomes_classify_as_ok() {
    with_backend(|backend| {
        let value = Outcome { ok: true };
        let status = rt::classify_with(is_failure, &value);
        assert_eq!(status, Status::Ok);
        rt::record_completion(
            None,
            "Orders.submit",
            status,
            Duration::from_millis(3),
            true,
            true,
            &[],
        );
        assert_eq!(backend.counter_total("Orders.submit.calls", "ok"), 1);
        assert_eq!(backend.counter_total("Orders.submit.calls", "error"), 0);
    });
}

#[test]
fn failed_outcomes_classify_as_error_without_raising() {
    with_backend(|backend| {
        let value = Outcome { ok: false };
        let status = rt::classify_with(is_failure, &value);
        assert_eq!(status, Status::Error);
        rt::record_completion(
            None,
            "Orders.submit",
            status,
            Duration::from_millis(3),
            true,
            true,
            &[],
        );
        assert_eq!(backend.counter_total("Orders.submit.calls", "error"), 1);
    });
}

#[test]
fn resolved_predicates_flow_into_the_emitted_wrapper() {
    let output = weave(
        r#"
        pub struct Receipt { pub ok: bool }

        pub fn is_failure(receipt: &Receipt) -> bool { !receipt.ok }

        #[traced]
        #[measured(error_when = "is_failure")]
        pub fn submit(order: u32) -> Receipt { Receipt { ok: order > 0 } }

        fn caller() {
            submit(7);
        }
        "#,
    );
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.wrappers.len(), 1);
    assert!(output.wrappers[0].source.contains("classify_with"));
    assert!(output.wrappers[0].source.contains("is_failure"));
}

#[test]
fn predicates_on_valueless_targets_degrade_to_always_ok() {
    let output = weave(
        r#"
        fn is_failure(code: &u32) -> bool { *code != 0 }

        #[measured(error_when = "is_failure")]
        fn fire_and_forget() {}

        fn caller() {
            fire_and_forget();
        }
        "#,
    );
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].code, DiagnosticCode::Otel003);
    assert_eq!(output.diagnostics[0].severity, Severity::Warning);
    // Still woven, with the default classification baked in.
    assert_eq!(output.wrappers.len(), 1);
    assert!(output.wrappers[0].source.contains("Status :: Ok"));
    assert!(!output.wrappers[0].source.contains("classify_with"));
}

#[test]
fn generic_targets_produce_otel001_and_no_wrappers() {
    let output = weave(
        r#"
        #[traced]
        fn lookup<T>(value: T) {}

        fn caller() {
            lookup(1u32);
            lookup("x");
        }
        "#,
    );
    assert!(output.wrappers.is_empty());
    assert_eq!(output.diagnostics.len(), 2);
    assert!(output
        .diagnostics
        .iter()
        .all(|d| d.code == DiagnosticCode::Otel001 && d.severity == Severity::Warning));
}

#[test]
fn async_targets_with_borrowed_parameters_produce_otel002_and_no_wrappers() {
    let output = weave(
        r#"
        #[traced]
        async fn send(buf: &[u8]) {}

        async fn caller() {
            send(b"payload").await;
        }
        "#,
    );
    assert!(output.wrappers.is_empty());
    assert_eq!(output.diagnostics.len(), 1);
    assert_eq!(output.diagnostics[0].code, DiagnosticCode::Otel002);
}

#[test]
fn dual_annotated_sites_are_woven_exactly_once() {
    let output = weave(
        r#"
        #[traced]
        #[measured(in_flight)]
        fn submit(order: u32) -> u32 { order }

        fn caller() {
            submit(1);
        }
        "#,
    );
    // The locator discovers the site once per annotation kind; the
    // deduplicator collapses them by location.
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.wrappers.len(), 1);
    assert!(output.wrappers[0].source.contains("start_span"));
    assert!(output.wrappers[0].source.contains("in_flight_guard"));
}

#[test]
fn each_distinct_location_gets_its_own_wrapper() {
    let output = weave(
        r#"
        #[traced]
        fn submit(order: u32) {}

        fn caller() {
            submit(1);
            submit(2);
        }
        "#,
    );
    assert_eq!(output.wrappers.len(), 2);
    assert_ne!(output.wrappers[0].location, output.wrappers[1].location);
    assert_ne!(
        output.wrappers[0].wrapper_name,
        output.wrappers[1].wrapper_name
    );
}

#[test]
fn async_targets_classify_into_the_optimized_variants() {
    let output = weave(
        r#"
        #[traced]
        async fn ping() {}

        #[traced]
        async fn fetch(id: u32) -> u32 { id }

        async fn caller() {
            ping().await;
            fetch(9).await;
        }
        "#,
    );
    assert_eq!(output.wrappers.len(), 2);
    let variants: Vec<_> = output.wrappers.iter().map(|w| &w.variant).collect();
    assert!(variants.contains(&&ShapeVariant::OptimizedFuture));
    assert!(variants.contains(&&ShapeVariant::OptimizedFutureOf("u32".to_string())));
}

#[test]
fn synchronously_completing_futures_take_the_fast_path_and_record_once() {
    with_backend(|backend| {
        fn is_nonzero(code: &u32) -> bool {
            *code != 0
        }

        // What an optimized wrapper does when the handle is already done:
        // no scheduling, one classification, one recording.
        match rt::first_poll(std::future::ready(0u32)) {
            FirstPoll::Ready(completed) => {
                let value = completed.unwrap();
                let status = rt::classify_with(is_nonzero, &value);
                rt::record_completion(
                    None,
                    "Orders.fetch",
                    status,
                    Duration::from_millis(1),
                    true,
                    true,
                    &[],
                );
            }
            FirstPoll::Pending(_) => panic!("ready future must complete on the first poll"),
        }
        assert_eq!(backend.counter_total("Orders.fetch.calls", "ok"), 1);
        assert_eq!(backend.counter_total("Orders.fetch.calls", "error"), 0);
        let histograms = backend
            .events()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    spanweave::telemetry::TelemetryEvent::HistogramRecord { name, .. }
                        if name == "Orders.fetch.duration"
                )
            })
            .count();
        assert_eq!(histograms, 1);
    });
}

#[test]
fn method_call_sites_resolve_against_their_impl_type() {
    let output = weave(
        r#"
        struct OrderBook;

        impl OrderBook {
            #[measured(name = "book.place")]
            fn place(&mut self, order: u32) -> bool { order > 0 }
        }

        fn caller(book: &mut OrderBook) {
            book.place(4);
        }
        "#,
    );
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.wrappers.len(), 1);
    assert_eq!(output.wrappers[0].declaration_key, "OrderBook::place");
    assert!(output.wrappers[0].source.contains("__recv"));
    assert!(output.wrappers[0].source.contains("\"book.place\""));
}

#[test]
fn unannotated_calls_are_left_alone() {
    let output = weave(
        r#"
        #[traced]
        fn submit(order: u32) {}

        fn plain(order: u32) {}

        fn caller() {
            plain(1);
            plain(2);
        }
        "#,
    );
    assert!(output.wrappers.is_empty());
    assert!(output.diagnostics.is_empty());
}
