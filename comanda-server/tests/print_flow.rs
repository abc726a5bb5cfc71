//! End-to-end print flow tests
//!
//! Drives the real worker and sweeper against an in-memory job store, with
//! local TCP listeners standing in for network printers. The worker is
//! stepped manually through `tick()` so the tests stay deterministic.

use std::sync::Arc;
use std::time::Duration;

use comanda_server::printing::{
    JobStatus, JobStore, OrderData, PrintService, PrintWorker, PrinterDescriptor, RelayOutcome,
    RetryPolicy, StaleSweeper, TransportDispatcher,
};
use comanda_server::printing::types::{OrderItem, TransportKind, VenueInfo};
use tokio::io::AsyncReadExt;

const RESTAURANT: &str = "r-test";

fn sample_order(payment_ref: &str) -> OrderData {
    OrderData {
        order_number: "A-1042".to_string(),
        payment_reference: payment_ref.to_string(),
        venue: VenueInfo {
            name: "La Taberna".to_string(),
            address: "Calle Mayor 12, Madrid".to_string(),
            phone: None,
        },
        items: vec![
            OrderItem {
                quantity: 2,
                name: "Paella valenciana".to_string(),
                unit_price: 12.50,
                total: 25.00,
            },
            OrderItem {
                quantity: 1,
                name: "Agua con gas".to_string(),
                unit_price: 2.00,
                total: 2.00,
            },
        ],
        subtotal: 27.00,
        tax: 2.70,
        delivery_fee: 2.95,
        tip: 1.45,
        total: 34.10,
        special_instructions: None,
        customer_name: None,
        placed_at: 1754300000000,
    }
}

fn network_descriptor(port: u16) -> PrinterDescriptor {
    PrinterDescriptor {
        restaurant_id: RESTAURANT.to_string(),
        transport: TransportKind::Network {
            host: "127.0.0.1".to_string(),
            port,
        },
        paper_width: 48,
    }
}

fn relay_descriptor() -> PrinterDescriptor {
    PrinterDescriptor {
        restaurant_id: RESTAURANT.to_string(),
        transport: TransportKind::BluetoothRelay {
            device_id: "tab-1".to_string(),
        },
        paper_width: 48,
    }
}

fn test_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

struct Harness {
    store: JobStore,
    service: PrintService,
    worker: PrintWorker,
}

fn harness() -> Harness {
    let store = JobStore::open_in_memory().unwrap();
    let dispatcher = Arc::new(TransportDispatcher::new(
        store.clone(),
        Duration::from_millis(500),
        Duration::from_millis(500),
    ));
    let service = PrintService::new(store.clone(), test_policy());
    let worker = PrintWorker::new(
        store.clone(),
        dispatcher,
        test_policy(),
        Duration::from_millis(10),
    );
    Harness {
        store,
        service,
        worker,
    }
}

/// Accept one connection and return everything the printer side received
async fn printer_listener() -> (u16, tokio::task::JoinHandle<Vec<u8>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).await.unwrap();
        buf
    });
    (port, handle)
}

/// A port with nothing listening on it
fn refused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Wait out the (millisecond-scale) test backoff gate
async fn let_backoff_pass() {
    tokio::time::sleep(Duration::from_millis(25)).await;
}

// Scenario A: reachable network printer, first attempt succeeds
#[tokio::test]
async fn network_printer_completes_first_attempt() {
    let h = harness();
    let (port, received) = printer_listener().await;

    let receipt = h
        .service
        .submit(sample_order("pay-a"), network_descriptor(port))
        .unwrap();

    let dispatched = h.worker.tick().await.unwrap();
    assert_eq!(dispatched, 1);

    let job = h.service.get_job(&receipt.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.retry_count, 0);
    assert!(job.error_message.is_none());
    assert!(job.completed_at.is_some());

    // The printer actually received the rendered stream
    let bytes = received.await.unwrap();
    assert_eq!(bytes, job.receipt_bytes);
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("34,10"));
}

// Scenario B: connection refused twice, succeeds on the third attempt
#[tokio::test]
async fn network_printer_retries_then_completes() {
    let h = harness();
    let port = refused_port();

    let receipt = h
        .service
        .submit(sample_order("pay-b"), network_descriptor(port))
        .unwrap();

    // Attempts 1 and 2: refused
    for expected_retries in 1..=2u32 {
        assert_eq!(h.worker.tick().await.unwrap(), 1);
        let job = h.service.get_job(&receipt.job_id).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, expected_retries);
        assert!(job.error_message.is_some());
        let_backoff_pass().await;
    }

    // Printer comes back on the same port
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("rebind printer port");
    let received = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        sock.read_to_end(&mut buf).await.unwrap();
        buf
    });

    assert_eq!(h.worker.tick().await.unwrap(), 1);

    let job = h.service.get_job(&receipt.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.retry_count, 2);
    assert!(job.error_message.is_none());
    assert!(!received.await.unwrap().is_empty());
}

// Bounded retries: a printer that never answers fails the job after
// exactly max_retries attempts
#[tokio::test]
async fn always_failing_printer_exhausts_retry_budget() {
    let h = harness();
    let port = refused_port();

    let receipt = h
        .service
        .submit(sample_order("pay-x"), network_descriptor(port))
        .unwrap();

    for _ in 0..3 {
        h.worker.tick().await.unwrap();
        let_backoff_pass().await;
    }

    let job = h.service.get_job(&receipt.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 3);
    assert!(job.error_message.is_some());

    // Terminal: nothing left to dispatch
    assert_eq!(h.worker.tick().await.unwrap(), 0);
}

// Scenario C: relay accepts, grace period expires without a confirm, the
// sweep requeues exactly once, and the next attempt confirms successfully
#[tokio::test]
async fn relay_unconfirmed_is_requeued_once_then_confirmed() {
    let h = harness();
    let sweeper = StaleSweeper::new(
        h.store.clone(),
        test_policy(),
        Duration::from_millis(10),
        Duration::from_millis(10),
        Duration::from_millis(10),
    );

    let receipt = h
        .service
        .submit(sample_order("pay-c"), relay_descriptor())
        .unwrap();

    // Dispatch: accepted by the relay queue, job stays printing
    assert_eq!(h.worker.tick().await.unwrap(), 1);
    let job = h.service.get_job(&receipt.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Printing);

    // No confirm arrives within the grace period
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(sweeper.sweep_once().unwrap(), 1);

    let job = h.service.get_job(&receipt.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 1);

    // Exactly once per sweep: the job is pending now, a second pass is a no-op
    assert_eq!(sweeper.sweep_once().unwrap(), 0);

    // Second attempt: accepted again, pulled and confirmed by the device
    let_backoff_pass().await;
    assert_eq!(h.worker.tick().await.unwrap(), 1);

    let (pulled_id, bytes) = h.service.relay_pull(RESTAURANT).unwrap().unwrap();
    assert_eq!(pulled_id, receipt.job_id);
    assert!(!bytes.is_empty());

    let job = h
        .service
        .confirm_relay(&receipt.job_id, RelayOutcome::Completed, None)
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.retry_count, 1);
    assert!(job.error_message.is_none());
}

// Scenario D: an order with zero line items is rejected synchronously and
// leaves no trace in the store
#[tokio::test]
async fn empty_order_rejected_without_job_row() {
    let h = harness();
    let mut order = sample_order("pay-d");
    order.items.clear();

    let result = h.service.submit(order, relay_descriptor());
    assert!(result.is_err());

    assert!(h.service.jobs_for_restaurant(RESTAURANT).unwrap().is_empty());
    assert_eq!(h.store.stats().unwrap().total, 0);
}

// Idempotence: two intakes with the same payment reference, one job
#[tokio::test]
async fn duplicate_submission_yields_one_job() {
    let h = harness();
    let (port, received) = printer_listener().await;

    let first = h
        .service
        .submit(sample_order("pay-dup"), network_descriptor(port))
        .unwrap();
    let second = h
        .service
        .submit(sample_order("pay-dup"), network_descriptor(port))
        .unwrap();

    assert_eq!(first.job_id, second.job_id);
    assert!(!first.deduplicated);
    assert!(second.deduplicated);
    assert_eq!(h.service.jobs_for_restaurant(RESTAURANT).unwrap().len(), 1);

    // One physical receipt
    assert_eq!(h.worker.tick().await.unwrap(), 1);
    assert_eq!(h.worker.tick().await.unwrap(), 0);
    assert!(!received.await.unwrap().is_empty());
}

// Per-restaurant FIFO: the second job waits for the first to finish, then
// prints in creation order
#[tokio::test]
async fn jobs_print_in_creation_order() {
    let h = harness();

    // Two jobs for the same restaurant against a relay (keeps the first
    // one in flight until confirmed)
    let first = h
        .service
        .submit(sample_order("pay-f1"), relay_descriptor())
        .unwrap();
    // Distinct created_at millis so creation order is unambiguous
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = h
        .service
        .submit(sample_order("pay-f2"), relay_descriptor())
        .unwrap();

    assert_eq!(h.worker.tick().await.unwrap(), 1);
    assert_eq!(
        h.service.get_job(&first.job_id).unwrap().status,
        JobStatus::Printing
    );
    // J2 must not be claimed while J1 is in flight
    assert_eq!(
        h.service.get_job(&second.job_id).unwrap().status,
        JobStatus::Pending
    );
    assert_eq!(h.worker.tick().await.unwrap(), 0);

    h.service
        .confirm_relay(&first.job_id, RelayOutcome::Completed, None)
        .unwrap();

    assert_eq!(h.worker.tick().await.unwrap(), 1);
    assert_eq!(
        h.service.get_job(&second.job_id).unwrap().status,
        JobStatus::Printing
    );
}
