//! End-to-end runs with a scripted inventory, engine, and enrichment sources.

use async_trait::async_trait;
use outpost::cli::OutputFormat;
use outpost::config::{AppSettings, RunContext};
use outpost::enrich::{
    Enricher, InstanceLookup, InterfaceAttachments, NetworkInterface, ReverseResolver,
};
use outpost::error::{InventoryResult, LookupError, LookupResult, ScanResult};
use outpost::inventory::{parse_rows, Inventory, RawResource};
use outpost::output;
use outpost::pipeline::{self, RunOutcome, RunReport};
use outpost::{Anomaly, FindingSink, Port, RunError, ScanEngine, ScanError, ScanFinding};
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const INVENTORY: &str = r#"{"Results": [
    "{\"resourceId\":\"eni-1\",\"accountId\":\"111\",\"configuration\":{\"association\":{\"publicIp\":\"203.0.113.5\"}}}",
    "{\"resourceId\":\"eni-2\",\"accountId\":\"111\",\"configuration\":{\"association\":{\"publicIp\":\"203.0.113.9\"}}}",
    "{\"resourceId\":\"eni-3\",\"accountId\":\"222\"}"
]}"#;

const INTERFACES: &str = r#"{"NetworkInterfaces": [
    {"NetworkInterfaceId": "eni-1", "Attachment": {"InstanceId": "i-0aaa"}},
    {"NetworkInterfaceId": "eni-2", "Attachment": {"InstanceId": "i-0bbb"}}
]}"#;

struct StaticInventory(&'static str);

#[async_trait]
impl Inventory for StaticInventory {
    async fn public_resources(&self) -> InventoryResult<Vec<RawResource>> {
        parse_rows(self.0)
    }
}

/// Delivers every finding from its own task, all at once.
struct ConcurrentEngine {
    findings: Vec<(&'static str, u32)>,
    fail: bool,
}

impl ConcurrentEngine {
    fn new(findings: &[(&'static str, u32)]) -> Self {
        Self {
            findings: findings.to_vec(),
            fail: false,
        }
    }
}

#[async_trait]
impl ScanEngine for ConcurrentEngine {
    fn name(&self) -> &'static str {
        "concurrent"
    }

    fn port_count(&self) -> usize {
        100
    }

    async fn run(&self, _targets: Vec<IpAddr>, sink: Arc<dyn FindingSink>) -> ScanResult<()> {
        if self.fail {
            return Err(ScanError::WorkerFailed("probe task panicked".to_string()));
        }
        let handles: Vec<_> = self
            .findings
            .iter()
            .map(|&(host, port)| {
                let sink = Arc::clone(&sink);
                tokio::spawn(async move { sink.on_finding(ScanFinding::tcp(host, port)).await })
            })
            .collect();
        for handle in futures::future::join_all(handles).await {
            handle.map_err(|e| ScanError::WorkerFailed(e.to_string()))?;
        }
        Ok(())
    }
}

/// Reverse resolver that counts calls per address.
#[derive(Default)]
struct CountingResolver {
    names: HashMap<IpAddr, Vec<String>>,
    calls: Mutex<HashMap<IpAddr, usize>>,
}

impl CountingResolver {
    fn with(mut self, address: &str, name: &str) -> Self {
        self.names
            .insert(address.parse().unwrap(), vec![format!("{}.", name)]);
        self
    }

    fn calls(&self, address: &str) -> usize {
        let address: IpAddr = address.parse().unwrap();
        self.calls.lock().unwrap().get(&address).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ReverseResolver for CountingResolver {
    async fn reverse(&self, address: IpAddr) -> LookupResult<Vec<String>> {
        *self.calls.lock().unwrap().entry(address).or_default() += 1;
        tokio::task::yield_now().await;
        Ok(self.names.get(&address).cloned().unwrap_or_default())
    }
}

struct FailingInstances;

#[async_trait]
impl InstanceLookup for FailingInstances {
    async fn describe_interfaces(
        &self,
        _interface_id: &str,
    ) -> LookupResult<Vec<NetworkInterface>> {
        Err(LookupError::Api("request limit exceeded".to_string()))
    }
}

fn context() -> RunContext {
    RunContext::new(AppSettings::default()).unwrap()
}

async fn scan(engine: &ConcurrentEngine, enricher: Enricher) -> RunReport {
    let outcome = pipeline::run(
        &context(),
        &StaticInventory(INVENTORY),
        engine,
        enricher,
        std::future::pending(),
    )
    .await
    .unwrap();

    match outcome {
        RunOutcome::Completed(report) => report,
        other => panic!("expected a completed run, got {:?}", other),
    }
}

fn ports(values: &[u16]) -> BTreeSet<Port> {
    values.iter().copied().filter_map(Port::new).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exposure_per_resource() {
    let resolver = Arc::new(
        CountingResolver::default()
            .with("203.0.113.5", "web.example.com")
            .with("203.0.113.9", "mail.example.com"),
    );
    let enricher = Enricher::new(Duration::from_secs(1))
        .with_reverse_dns(resolver.clone())
        .with_instance_lookup(Arc::new(InterfaceAttachments::from_json(INTERFACES).unwrap()));
    let engine = ConcurrentEngine::new(&[
        ("203.0.113.5", 22),
        ("203.0.113.5", 22),
        ("203.0.113.5", 443),
        ("203.0.113.9", 80),
    ]);

    let report = scan(&engine, enricher).await;
    let records = &report.exposure.records;

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].resource_id, "eni-1");
    assert_eq!(records[0].open_ports, ports(&[22, 443]));
    assert_eq!(records[0].instance_id.as_deref(), Some("i-0aaa"));
    assert!(records[0].hostnames.contains("web.example.com"));
    assert_eq!(records[1].resource_id, "eni-2");
    assert_eq!(records[1].open_ports, ports(&[80]));
    assert_eq!(records[1].instance_id.as_deref(), Some("i-0bbb"));

    assert_eq!(resolver.calls("203.0.113.5"), 2);
    assert_eq!(resolver.calls("203.0.113.9"), 1);
    assert!(report.exposure.anomalies.is_empty());
    assert!(report.complete);
    assert_eq!(report.targets, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_report_is_independent_of_arrival_order() {
    let findings = [
        ("203.0.113.9", 80),
        ("203.0.113.5", 443),
        ("198.51.100.1", 22),
        ("203.0.113.5", 22),
        ("203.0.113.9", 8080),
        ("203.0.113.5", 22),
        ("not-an-address", 22),
    ];

    let mut rendered = Vec::new();
    for rotation in 0..findings.len() {
        let mut order = findings.to_vec();
        order.rotate_left(rotation);
        if rotation % 2 == 1 {
            order.reverse();
        }

        let enricher = Enricher::new(Duration::from_secs(1));
        let report = scan(&ConcurrentEngine::new(&order), enricher).await;
        let plain = output::render(&report, OutputFormat::Plain).unwrap();
        let csv = output::render(&report, OutputFormat::Csv).unwrap();
        rendered.push((plain, csv, report.exposure.anomalies.clone()));
    }

    assert!(rendered.windows(2).all(|pair| pair[0] == pair[1]));

    let (plain, csv, anomalies) = &rendered[0];
    assert_eq!(
        csv,
        "address,open_ports,resource_id,account_id\n\
         203.0.113.5,\"22,443\",eni-1,111\n\
         203.0.113.9,\"80,8080\",eni-2,111\n"
    );
    assert!(plain.starts_with("IP ADDRESS"));
    assert_eq!(anomalies.len(), 2);
    assert!(anomalies.contains(&Anomaly::UnknownAddress {
        address: "198.51.100.1".parse().unwrap()
    }));
    assert!(anomalies
        .iter()
        .any(|a| matches!(a, Anomaly::MalformedFinding { host, .. } if host == "not-an-address")));
}

#[tokio::test]
async fn test_failed_enrichment_keeps_the_port() {
    let enricher =
        Enricher::new(Duration::from_millis(200)).with_instance_lookup(Arc::new(FailingInstances));
    let report = scan(&ConcurrentEngine::new(&[("203.0.113.5", 22)]), enricher).await;

    assert_eq!(report.exposure.records.len(), 1);
    assert_eq!(report.exposure.records[0].open_ports, ports(&[22]));
    assert_eq!(report.exposure.records[0].instance_id, None);
    assert!(matches!(
        report.exposure.anomalies.as_slice(),
        [Anomaly::InstanceUnresolved { resource_id, .. }] if resource_id == "eni-1"
    ));
}

#[tokio::test]
async fn test_no_findings_is_an_empty_report() {
    let report = scan(&ConcurrentEngine::new(&[]), Enricher::new(Duration::from_millis(100))).await;
    assert!(report.exposure.is_empty());
    assert_eq!(
        output::render(&report, OutputFormat::Csv).unwrap(),
        "address,open_ports,resource_id,account_id\n"
    );
}

#[tokio::test]
async fn test_json_report_carries_anomalies() {
    let report = scan(
        &ConcurrentEngine::new(&[("203.0.113.5", 22), ("198.51.100.1", 22)]),
        Enricher::new(Duration::from_millis(100)),
    )
    .await;

    let json: serde_json::Value =
        serde_json::from_str(&output::render(&report, OutputFormat::Json).unwrap()).unwrap();
    assert_eq!(json["complete"], true);
    assert_eq!(json["records"][0]["resource_id"], "eni-1");
    assert_eq!(json["records"][0]["open_ports"], serde_json::json!([22]));
    assert_eq!(json["anomalies"][0]["kind"], "unknown_address");
}

#[tokio::test]
async fn test_empty_inventory_is_nothing_to_scan() {
    let outcome = pipeline::run(
        &context(),
        &StaticInventory(r#"{"Results": []}"#),
        &ConcurrentEngine::new(&[("203.0.113.5", 22)]),
        Enricher::new(Duration::from_millis(100)),
        std::future::pending(),
    )
    .await
    .unwrap();
    assert!(matches!(outcome, RunOutcome::NothingToScan));
}

#[tokio::test]
async fn test_engine_failure_aborts_the_run() {
    let mut engine = ConcurrentEngine::new(&[]);
    engine.fail = true;
    let result = pipeline::run(
        &context(),
        &StaticInventory(INVENTORY),
        &engine,
        Enricher::new(Duration::from_millis(100)),
        std::future::pending(),
    )
    .await;
    assert!(matches!(result, Err(RunError::Scan(ScanError::WorkerFailed(_)))));
}
