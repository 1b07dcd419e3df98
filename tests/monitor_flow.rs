//! End-to-end sweeps: real HttpChecker against a mock server, in-memory store.

mod helpers;

use std::sync::Arc;

use chrono::Duration;
use httptest::{matchers::*, responders::*, Expectation, Server};
use tokio::sync::RwLock;

use helpers::{create_test_pool, fast_defaults, mock_site, test_clock, RecordingNotifier, Sent};
use site_monitor::config::{MonitorConfig, SitePatch};
use site_monitor::initialization::init_client;
use site_monitor::storage::SiteStatus;
use site_monitor::time_utils::{Clock, ManualClock};
use site_monitor::{CheckErrorKind, HttpChecker, Scheduler, StateStore};

struct Monitor {
    scheduler: Scheduler,
    store: Arc<StateStore>,
    notifier: Arc<RecordingNotifier>,
    clock: Arc<ManualClock>,
}

async fn monitor(config: MonitorConfig) -> Monitor {
    let clock = test_clock();
    let store = Arc::new(StateStore::new(create_test_pool().await, clock.clone()));
    let notifier = Arc::new(RecordingNotifier::default());
    let checker = Arc::new(HttpChecker::new(
        init_client().expect("client"),
        clock.clone(),
    ));
    let scheduler = Scheduler::new(
        Arc::new(RwLock::new(config)),
        store.clone(),
        checker,
        notifier.clone(),
    );
    Monitor {
        scheduler,
        store,
        notifier,
        clock,
    }
}

async fn point_to(monitor: &Monitor, site_id: &str, url: String) {
    let catalog = monitor.scheduler.catalog();
    let mut catalog = catalog.write().await;
    let patch = SitePatch {
        url: Some(url),
        ..Default::default()
    };
    assert!(catalog.update_site(site_id, patch).expect("valid patch"));
}

#[tokio::test]
async fn test_outage_lifecycle_with_mutes() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/down"))
            .times(2)
            .respond_with(status_code(500)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/up"))
            .respond_with(status_code(200)),
    );

    let config = MonitorConfig {
        default: fast_defaults(),
        sites: vec![mock_site("shop", &server, "/down")],
        ..Default::default()
    };
    let m = monitor(config).await;

    // First failed sweep: UP -> DOWN.
    let report = m.scheduler.check_all_sites().await;
    assert_eq!(report.down, 1);
    assert_eq!(
        m.notifier.take(),
        vec![Sent::Down {
            site_id: "shop".to_string(),
            error: Some("Wrong HTTP code: 500, expected: 200".to_string()),
        }]
    );
    let state = m.store.get_state("shop").await.expect("state");
    let first_incident = state.current_incident_id.expect("open incident");

    // User 100 mutes; the reminder still goes out, with the mute attached.
    assert!(m.store.mute(100, "shop").await.expect("mute"));
    m.clock.advance(Duration::minutes(15));
    assert_eq!(m.scheduler.send_due_reminders().await.expect("reminders"), 1);
    assert_eq!(
        m.notifier.take(),
        vec![Sent::Reminder {
            site_id: "shop".to_string(),
            number: 1,
            muted: vec![100],
        }]
    );

    // Recovery: DOWN -> UP, incident closed, mutes cleared.
    point_to(&m, "shop", format!("http://{}/up", server.addr())).await;
    m.clock.advance(Duration::seconds(90));
    let summary = m.scheduler.check_single_site("shop").await.expect("configured");
    assert!(summary.starts_with("✅ shop (200)"));
    assert_eq!(
        m.notifier.take(),
        vec![Sent::Up {
            site_id: "shop".to_string(),
            downtime: Some(15 * 60 + 90),
        }]
    );
    let incident = m
        .store
        .get_incident(first_incident)
        .await
        .expect("query")
        .expect("incident exists");
    assert_eq!(incident.duration_seconds, Some(15 * 60 + 90));
    assert_eq!(incident.error_type, Some(CheckErrorKind::WrongCode));
    assert!(!m.store.is_muted(100, "shop").await.expect("is_muted"));

    // A new outage is a new incident and the old mute does not apply.
    point_to(&m, "shop", format!("http://{}/down", server.addr())).await;
    m.clock.advance(Duration::minutes(10));
    m.scheduler.check_all_sites().await;
    let state = m.store.get_state("shop").await.expect("state");
    assert_eq!(state.status, SiteStatus::Down);
    assert_ne!(state.current_incident_id, Some(first_incident));

    m.clock.advance(Duration::minutes(15));
    m.scheduler.send_due_reminders().await.expect("reminders");
    let sent = m.notifier.take();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[1],
        Sent::Reminder {
            site_id: "shop".to_string(),
            number: 1,
            muted: vec![],
        }
    );

    let history = m.store.site_incidents("shop", 30, 10).await.expect("history");
    assert_eq!(history.len(), 2);
    assert!(history[0].is_open());
    assert!(!history[1].is_open());
}

#[tokio::test]
async fn test_sweep_covers_every_site_despite_failures() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/ok"))
            .times(2)
            .respond_with(status_code(200).body("Catalog")),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/broken"))
            .respond_with(status_code(502)),
    );

    let mut catalog_site = mock_site("catalog", &server, "/ok");
    catalog_site.keywords = vec!["Catalog".to_string(), "Cart".to_string()];
    let config = MonitorConfig {
        default: fast_defaults(),
        sites: vec![
            mock_site("home", &server, "/ok"),
            mock_site("api", &server, "/broken"),
            catalog_site,
        ],
        ..Default::default()
    };
    let m = monitor(config).await;

    let report = m.scheduler.check_all_sites().await;

    assert_eq!((report.up, report.down, report.faults), (1, 2, 0));
    assert_eq!(report.lines[0], "✅ home (200)");
    assert_eq!(
        report.lines[1],
        "❌ api (502) - Wrong HTTP code: 502, expected: 200"
    );
    assert_eq!(
        report.lines[2],
        "❌ catalog (200) - Keyword missing: Cart (found: Catalog)"
    );

    let states = m.store.get_all_states().await.expect("states");
    assert_eq!(states.len(), 3);
    assert!(!states["home"].is_down());
    assert!(states["api"].is_down());
    assert!(states["catalog"].is_down());
}

#[tokio::test]
async fn test_stats_after_recovery() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/flaky"))
            .respond_with(status_code(500)),
    );
    server.expect(
        Expectation::matching(request::method_path("GET", "/fixed"))
            .respond_with(status_code(200)),
    );
    let config = MonitorConfig {
        default: fast_defaults(),
        sites: vec![mock_site("blog", &server, "/flaky")],
        ..Default::default()
    };
    let m = monitor(config).await;

    m.scheduler.check_all_sites().await;
    m.clock.advance(Duration::hours(1));
    point_to(&m, "blog", format!("http://{}/fixed", server.addr())).await;
    m.scheduler.check_all_sites().await;

    let stats = m.store.site_stats("blog").await.expect("stats");
    assert_eq!(stats.uptime_7d, 99.4);
    assert_eq!(stats.incidents_30d, 1);
    assert_eq!(stats.avg_downtime_seconds, 3600);
    assert_eq!(
        stats.last_incident_at,
        Some(m.clock.now() - Duration::hours(1))
    );
}
