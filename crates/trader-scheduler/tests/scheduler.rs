//! End-to-end job runs against in-process fakes

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio_test::assert_ok;
use trader_llm::{AgentGateway, GenerationOptions, LLMError, ProviderResponse};
use trader_market::{
    KlineInterval, MarketDataGateway, MarketError, PriceBar, Ticker24h, to_exchange_symbol,
};
use trader_scheduler::{
    AnalysisScheduler, InMemoryStore, Instrument, JobKind, JobReport, PersistenceGateway,
    SchedulerConfig, SchedulerError, Trigger, User,
};

struct FakeMarket {
    quotes: HashMap<String, f64>,
    broken_history: HashSet<String>,
    empty_history: HashSet<String>,
}

impl FakeMarket {
    fn new() -> Self {
        Self {
            quotes: HashMap::new(),
            broken_history: HashSet::new(),
            empty_history: HashSet::new(),
        }
    }

    fn with_empty_history(mut self, symbol: &str) -> Self {
        self.empty_history.insert(symbol.to_string());
        self
    }

    fn with_quote(mut self, symbol: &str, price: f64) -> Self {
        self.quotes.insert(symbol.to_string(), price);
        self
    }

    fn with_broken_history(mut self, symbol: &str) -> Self {
        self.broken_history.insert(symbol.to_string());
        self
    }
}

#[async_trait]
impl MarketDataGateway for FakeMarket {
    async fn get_history(
        &self,
        symbol: &str,
        _interval: KlineInterval,
        limit: usize,
    ) -> trader_market::Result<Vec<PriceBar>> {
        if self.broken_history.contains(symbol) {
            return Err(MarketError::ApiError(format!("history for {symbol} failed")));
        }
        if self.empty_history.contains(symbol) {
            return Ok(Vec::new());
        }

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Ok((0..limit.min(60))
            .map(|i| {
                let close = 100.0 + i as f64;
                PriceBar {
                    symbol: symbol.to_string(),
                    timestamp: start + ChronoDuration::hours(i64::try_from(i).unwrap()),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 5.0,
                }
            })
            .collect())
    }

    async fn get_batch_quotes(
        &self,
        symbols: &[String],
    ) -> trader_market::Result<HashMap<String, f64>> {
        Ok(symbols
            .iter()
            .map(|symbol| to_exchange_symbol(symbol))
            .filter_map(|pair| self.quotes.get(&pair).map(|price| (pair, *price)))
            .collect())
    }

    async fn get_price(&self, symbol: &str) -> trader_market::Result<f64> {
        self.quotes
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketError::InvalidSymbol(symbol.to_string()))
    }

    async fn get_ticker_24h(&self, symbol: &str) -> trader_market::Result<Ticker24h> {
        Err(MarketError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: "not tracked".to_string(),
        })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Agent whose calls can be held open until the test releases them
#[derive(Default)]
struct GatedAgent {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    gated: AtomicBool,
    failing: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedAgent {
    fn gated() -> Self {
        let agent = Self::default();
        agent.gated.store(true, Ordering::SeqCst);
        agent
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentGateway for GatedAgent {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerationOptions,
    ) -> trader_llm::Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.entered.notify_one();
        if self.gated.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(LLMError::ProviderError("upstream unavailable".to_string()));
        }

        let symbol = prompt
            .lines()
            .find_map(|line| line.strip_prefix("Analyze the following technical data for "))
            .unwrap_or("?");
        Ok(ProviderResponse::Text(format!(
            "{{\"recommendation\":\"HOLD\",\"symbol\":\"{}\"}}",
            symbol.trim_end_matches(':')
        )))
    }
}

async fn store_with(symbols: &[&str]) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for symbol in symbols {
        store
            .add_instrument(Instrument::new(*symbol, 0.0))
            .await
            .unwrap();
    }
    store
}

fn scheduler(
    market: FakeMarket,
    agent: Arc<GatedAgent>,
    store: Arc<InMemoryStore>,
    config: SchedulerConfig,
) -> Arc<AnalysisScheduler> {
    Arc::new(AnalysisScheduler::new(Arc::new(market), agent, store, config))
}

fn analysis(report: JobReport) -> trader_scheduler::AnalysisReport {
    match report {
        JobReport::Analysis(report) => report,
        other => panic!("expected an analysis report, got {other:?}"),
    }
}

#[tokio::test]
async fn test_analysis_is_single_flight() {
    let agent = Arc::new(GatedAgent::gated());
    let store = store_with(&["BTCUSDT"]).await;
    let scheduler = scheduler(
        FakeMarket::new(),
        Arc::clone(&agent),
        store,
        SchedulerConfig::default(),
    );

    let first = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move { scheduler.tick(JobKind::Analysis).await }
    });

    // First cycle is now parked inside the agent call
    agent.entered.notified().await;
    assert!(scheduler.is_analysis_running());

    let second = assert_ok!(scheduler.tick(JobKind::Analysis).await);
    assert_eq!(second, JobReport::Skipped);
    assert_eq!(agent.calls(), 1);

    agent.release.notify_one();
    let report = analysis(first.await.unwrap().unwrap());
    assert_eq!(report.results.len(), 1);
    assert!(!scheduler.is_analysis_running());

    // Guard is free again: the next tick reaches the agent
    agent.release.notify_one();
    let report = analysis(assert_ok!(scheduler.tick(JobKind::Analysis).await));
    assert_eq!(report.results.len(), 1);
    assert_eq!(agent.calls(), 2);
}

#[tokio::test]
async fn test_guard_released_after_failed_cycle() {
    let agent = Arc::new(GatedAgent::default());
    agent.failing.store(true, Ordering::SeqCst);
    let store = store_with(&["ETHUSDT"]).await;
    let scheduler = scheduler(
        FakeMarket::new(),
        Arc::clone(&agent),
        store,
        SchedulerConfig::default(),
    );

    let report = analysis(assert_ok!(scheduler.tick(JobKind::Analysis).await));
    assert!(report.results.is_empty());
    assert_eq!(report.failed, 1);
    assert!(!scheduler.is_analysis_running());

    agent.failing.store(false, Ordering::SeqCst);
    let report = analysis(assert_ok!(scheduler.tick(JobKind::Analysis).await));
    assert_eq!(report.results.len(), 1);
    assert_eq!(agent.calls(), 2);
}

#[tokio::test]
async fn test_guard_released_after_listing_failure() {
    struct BrokenStore;

    #[async_trait]
    impl PersistenceGateway for BrokenStore {
        async fn list_instruments(&self) -> trader_scheduler::Result<Vec<Instrument>> {
            Err(SchedulerError::Persistence("connection refused".to_string()))
        }
        async fn update_instrument_price(&self, _symbol: &str, _price: f64) -> trader_scheduler::Result<()> {
            Ok(())
        }
        async fn add_instrument(&self, _instrument: Instrument) -> trader_scheduler::Result<()> {
            Ok(())
        }
        async fn list_users(&self) -> trader_scheduler::Result<Vec<User>> {
            Ok(Vec::new())
        }
        async fn get_balance(
            &self,
            _wallet_address: &str,
        ) -> trader_scheduler::Result<Option<trader_scheduler::Balance>> {
            Ok(None)
        }
        async fn record_balance_snapshot(
            &self,
            _balance_id: u64,
            _amount: f64,
        ) -> trader_scheduler::Result<trader_scheduler::BalanceSnapshot> {
            Err(SchedulerError::Persistence("read only".to_string()))
        }
    }

    let agent = Arc::new(GatedAgent::default());
    let scheduler = Arc::new(AnalysisScheduler::new(
        Arc::new(FakeMarket::new()),
        Arc::clone(&agent) as Arc<dyn AgentGateway>,
        Arc::new(BrokenStore),
        SchedulerConfig::default(),
    ));

    let err = scheduler.tick(JobKind::Analysis).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Persistence(_)));
    assert!(!scheduler.is_analysis_running());
    assert_eq!(agent.calls(), 0);
}

#[tokio::test]
async fn test_partial_failure_keeps_other_instruments() {
    let agent = Arc::new(GatedAgent::default());
    let store = store_with(&["BTCUSDT", "ETHUSDT", "SOLUSDT"]).await;
    let market = FakeMarket::new().with_broken_history("ETHUSDT");
    let scheduler = scheduler(market, Arc::clone(&agent), store, SchedulerConfig::default());

    let report = analysis(assert_ok!(scheduler.tick(JobKind::Analysis).await));

    let symbols: Vec<&str> = report.results.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTCUSDT", "SOLUSDT"]);
    assert_eq!(report.failed, 1);
    assert_eq!(agent.calls(), 2);
    assert!(report.results[0].raw_text.contains("\"symbol\":\"BTCUSDT\""));
}

#[tokio::test]
async fn test_empty_history_still_reaches_the_agent() {
    let agent = Arc::new(GatedAgent::default());
    let store = store_with(&["BTCUSDT"]).await;
    let market = FakeMarket::new().with_empty_history("BTCUSDT");
    let scheduler = scheduler(market, Arc::clone(&agent), store, SchedulerConfig::default());

    let report = analysis(assert_ok!(scheduler.tick(JobKind::Analysis).await));

    assert_eq!(report.failed, 0);
    assert_eq!(report.results.len(), 1);
    assert_eq!(agent.calls(), 1);

    let prompts = agent.prompts.lock().unwrap();
    assert!(prompts[0].contains("Current Price: 0.00"));
    assert!(prompts[0].contains("RSI: 50.00"));
}

#[tokio::test]
async fn test_provider_timeout_is_a_per_instrument_failure() {
    // Gated and never released: every call hangs
    let agent = Arc::new(GatedAgent::gated());
    let store = store_with(&["BTCUSDT"]).await;
    let config = SchedulerConfig::builder()
        .provider_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let scheduler = scheduler(FakeMarket::new(), Arc::clone(&agent), store, config);

    let report = analysis(assert_ok!(scheduler.tick(JobKind::Analysis).await));
    assert!(report.results.is_empty());
    assert_eq!(report.failed, 1);
    assert!(!scheduler.is_analysis_running());
}

#[tokio::test]
async fn test_price_sync_skips_missing_symbols() {
    let store = store_with(&["BTCUSDT", "FOOUSDT", "SOLUSDT"]).await;
    let market = FakeMarket::new()
        .with_quote("BTCUSDT", 64_000.0)
        .with_quote("SOLUSDT", 150.5);
    let scheduler = scheduler(
        market,
        Arc::new(GatedAgent::default()),
        Arc::clone(&store),
        SchedulerConfig::default(),
    );

    let report = assert_ok!(scheduler.tick(JobKind::PriceSync).await);
    assert_eq!(
        report,
        JobReport::PriceSync(trader_scheduler::PriceSyncReport { updated: 2 })
    );
    assert_eq!(store.instrument("BTCUSDT").await.unwrap().current_price, 64_000.0);
    assert_eq!(store.instrument("SOLUSDT").await.unwrap().current_price, 150.5);
    assert_eq!(store.instrument("FOOUSDT").await.unwrap().current_price, 0.0);
}

#[tokio::test]
async fn test_snapshot_counts_users_with_balances() {
    let store = Arc::new(InMemoryStore::new());
    store.add_user(User::new("0xaaa"), Some(1_000.0)).await;
    store.add_user(User::new("0xbbb"), None).await;
    store.add_user(User::new("0xccc"), Some(12.5)).await;
    let scheduler = scheduler(
        FakeMarket::new(),
        Arc::new(GatedAgent::default()),
        Arc::clone(&store),
        SchedulerConfig::default(),
    );

    let report = assert_ok!(scheduler.tick(JobKind::Snapshot).await);
    assert_eq!(
        report,
        JobReport::Snapshot(trader_scheduler::SnapshotReport {
            snapshots: 2,
            total: 3
        })
    );

    let mut amounts: Vec<f64> = store.snapshots().await.iter().map(|s| s.amount).collect();
    amounts.sort_by(f64::total_cmp);
    assert_eq!(amounts, vec![12.5, 1_000.0]);
}

#[tokio::test]
async fn test_add_instrument_normalizes_symbol() {
    let store = Arc::new(InMemoryStore::new());
    let market = FakeMarket::new().with_quote("DOGEUSDT", 0.15);
    let scheduler = scheduler(
        market,
        Arc::new(GatedAgent::default()),
        Arc::clone(&store),
        SchedulerConfig::default(),
    );

    let instrument = assert_ok!(scheduler.add_instrument("doge").await);
    assert_eq!(instrument, Instrument::new("DOGEUSDT", 0.15));
    assert_eq!(store.list_instruments().await.unwrap(), vec![instrument]);

    assert!(scheduler.add_instrument("nope").await.is_err());
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let agent = Arc::new(GatedAgent::default());
    let store = store_with(&["BTCUSDT"]).await;
    let market = FakeMarket::new().with_quote("BTCUSDT", 42.0);
    let config = SchedulerConfig::builder()
        .price_sync_interval(Duration::from_millis(20))
        .analysis_interval(Duration::from_millis(30))
        .build()
        .unwrap();
    let scheduler = scheduler(market, Arc::clone(&agent), Arc::clone(&store), config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx));

    // Wait for the first analysis cycle to reach the agent
    agent.entered.notified().await;
    shutdown_tx.send(true).unwrap();

    assert_ok!(handle.await.unwrap());
    assert!(agent.calls() >= 1);
    assert!(!scheduler.is_analysis_running());
    assert_eq!(store.instrument("BTCUSDT").await.unwrap().current_price, 42.0);
}

#[test]
fn test_job_table_follows_config() {
    let config = SchedulerConfig::builder()
        .price_sync_interval(Duration::from_secs(5))
        .analysis_interval(Duration::from_secs(60))
        .build()
        .unwrap();
    let snapshot_time = config.snapshot_time;
    let scheduler = scheduler(
        FakeMarket::new(),
        Arc::new(GatedAgent::default()),
        Arc::new(InMemoryStore::new()),
        config,
    );

    assert_eq!(
        scheduler.jobs(),
        [
            (JobKind::PriceSync, Trigger::Every(Duration::from_secs(5))),
            (JobKind::Analysis, Trigger::Every(Duration::from_secs(60))),
            (JobKind::Snapshot, Trigger::DailyAt(snapshot_time)),
        ]
    );
}

#[tokio::test]
async fn test_run_drops_analysis_firings_while_cycle_in_flight() {
    let agent = Arc::new(GatedAgent::gated());
    let store = store_with(&["BTCUSDT"]).await;
    let config = SchedulerConfig::builder()
        .price_sync_interval(Duration::from_secs(3600))
        .analysis_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    let scheduler = scheduler(FakeMarket::new(), Arc::clone(&agent), store, config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(Arc::clone(&scheduler).run(shutdown_rx));

    agent.entered.notified().await;
    // Several more analysis firings pass while the first cycle is parked
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(agent.calls(), 1);
    assert!(scheduler.is_analysis_running());

    agent.gated.store(false, Ordering::SeqCst);
    agent.release.notify_one();
    shutdown_tx.send(true).unwrap();

    assert_ok!(handle.await.unwrap());
    assert!(!scheduler.is_analysis_running());
}
