//! End-to-end pipeline tests against a scripted transport.
//!
//! Each test wires a `Geocoder` to a `ScriptedTransport` whose responder
//! builds the result body from the submitted address file, then checks what
//! the engine returned, cached and dispatched.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use geobatch_core::codec::{self, COMMA};
use geobatch_core::{
    async_listener, BatchSubmission, BatchTransport, Endpoint, GeocodeAddress, GeocodeError,
    GeocodeListener, GeocodeResponse, Geocoder, GeocoderConfig, Geography,
    ListenerFailurePolicy, TransportError, MAX_BATCH_SIZE,
};

// ─── Helpers ──────────────────────────────────────────────────────────────────

type Responder = dyn Fn(&BatchSubmission, u32) -> Result<String, TransportError> + Send + Sync;

struct ScriptedTransport {
    responder: Box<Responder>,
    attempts: AtomicU32,
    submissions: Mutex<Vec<BatchSubmission>>,
}

impl ScriptedTransport {
    fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&BatchSubmission, u32) -> Result<String, TransportError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Box::new(responder),
            attempts: AtomicU32::new(0),
            submissions: Mutex::new(Vec::new()),
        })
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn submissions(&self) -> Vec<BatchSubmission> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchTransport for ScriptedTransport {
    async fn submit(
        &self,
        submission: &BatchSubmission,
        _timeout: Duration,
    ) -> Result<String, TransportError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.submissions.lock().unwrap().push(submission.clone());
        (self.responder)(submission, attempt)
    }

    fn url(&self) -> &str {
        "scripted://census"
    }
}

fn match_line(id: &str, query: &str, lon: f64, lat: f64) -> String {
    format!(
        "\"{id}\",\"{query}\",\"Match\",\"Exact\",\"{}\",\"{lon},{lat}\",\"636\",\"L\"",
        query.to_uppercase()
    )
}

/// Every submitted row matches; coordinates derived from the row position.
fn match_everything(sub: &BatchSubmission, _attempt: u32) -> Result<String, TransportError> {
    let lines: Vec<String> = codec::decode(&sub.address_file, COMMA)
        .iter()
        .enumerate()
        .map(|(i, row)| match_line(&row[0], &row[1], -77.0 - i as f64, 38.0 + i as f64))
        .collect();
    Ok(lines.join("\n"))
}

fn fast_config() -> GeocoderConfig {
    GeocoderConfig::default().timeout(Duration::from_millis(1))
}

fn recorder(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<dyn GeocodeListener> {
    Arc::new(move |r: &GeocodeResponse| -> Result<(), GeocodeError> {
        log.lock().unwrap().push(format!("{tag}:{}", r.id));
        Ok(())
    })
}

// ─── Classification and caching ───────────────────────────────────────────────

#[tokio::test]
async fn match_no_match_and_tie() {
    let transport = ScriptedTransport::new(|_, _| {
        Ok([
            match_line("a", "1 Main St, City, ST", -77.03, 38.90),
            "\"b\",\"2 Oak Ave\",\"No_Match\"".to_string(),
            "\"c\",\"3 Elm St\",\"Tie\"".to_string(),
            String::new(),
        ]
        .join("\n"))
    });
    let mut g = Geocoder::new(transport.clone(), fast_config());
    g.add("a", GeocodeAddress::street("1 Main St").city("City").state("ST"), None);
    g.add("b", GeocodeAddress::street("2 Oak Ave"), None);
    g.add("c", GeocodeAddress::street("3 Elm St"), None);

    let matched = g.geocode(None).await.unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].lat, 38.90);
    assert_eq!(matched[0].lon, -77.03);
    assert!(matched[0].exact);
    assert_eq!(g.get("a"), Some(&matched[0]));

    assert!(g.no_match("b"));
    assert!(g.get("b").is_none());

    // ties are neither cached nor recorded as misses
    assert!(g.get("c").is_none());
    assert!(!g.no_match("c"));

    let subs = transport.submissions();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].endpoint, Endpoint::Locations);
    assert_eq!(subs[0].benchmark, "4");
    assert_eq!(subs[0].vintage, None);
    assert_eq!(
        subs[0].address_file,
        "\"a\",\"1 Main St\",\"City\",\"ST\",\"\"\n\
         \"b\",\"2 Oak Ave\",\"\",\"\",\"\"\n\
         \"c\",\"3 Elm St\",\"\",\"\",\"\""
    );
    assert!(!g.has_geocode_batch());
}

#[tokio::test]
async fn results_are_per_call() {
    let transport = ScriptedTransport::new(match_everything);
    let mut g = Geocoder::new(transport, fast_config());
    g.add("a", GeocodeAddress::street("1 Main St"), None);
    assert_eq!(g.geocode(None).await.unwrap().len(), 1);

    g.add("b", GeocodeAddress::street("2 Main St"), None);
    let second = g.geocode(None).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, "b");
    assert_eq!(g.cached_count(), 2);
}

#[tokio::test]
async fn batch_size_bounds_the_slice() {
    let transport = ScriptedTransport::new(match_everything);
    let mut g = Geocoder::new(transport.clone(), fast_config());
    for i in 0..5 {
        g.add_unique(GeocodeAddress::street(format!("{i} Main St")), None);
    }

    let matched = g.geocode(Some(2)).await.unwrap();
    let ids: Vec<_> = matched.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["0", "1"]);
    assert_eq!(g.current_batch_size(), 3);
    assert_eq!(transport.submissions()[0].address_file.lines().count(), 2);

    let rest: Vec<_> = g.pending().map(|r| r.id.as_str()).collect();
    assert_eq!(rest, ["2", "3", "4"]);
}

#[tokio::test]
async fn disabled_cache_records_nothing() {
    let transport = ScriptedTransport::new(|sub, _| {
        let first = match_everything(sub, 1)?;
        Ok(format!("{first}\n\"miss\",\"x\",\"No_Match\""))
    });
    let mut g = Geocoder::new(transport, fast_config());
    g.use_cache(false);
    g.add("a", GeocodeAddress::street("1 Main St"), None);

    let matched = g.geocode(None).await.unwrap();
    assert_eq!(matched.len(), 1);
    assert!(g.get("a").is_none());
    assert!(!g.no_match("miss"));
}

#[tokio::test]
async fn clear_cache_keeps_misses_and_listeners() {
    let transport = ScriptedTransport::new(|sub, _| {
        let first = match_everything(sub, 1)?;
        Ok(format!("{first}\n\"miss\",\"x\",\"No_Match\""))
    });
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut g = Geocoder::new(transport, fast_config());
    g.add("a", GeocodeAddress::street("1 Main St"), Some(recorder(log.clone(), "s")));
    g.geocode(None).await.unwrap();

    g.clear_cache();
    assert!(g.get("a").is_none());
    assert!(g.no_match("miss"));
    assert!(g.has_listeners("a"));
}

#[tokio::test]
async fn duplicate_ids_fire_per_row_and_last_wins() {
    let transport = ScriptedTransport::new(match_everything);
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut g = Geocoder::new(transport, fast_config());
    g.add("dup", GeocodeAddress::street("1 Main St"), Some(recorder(log.clone(), "s")));
    g.add("dup", GeocodeAddress::street("2 Main St"), None);

    let matched = g.geocode(None).await.unwrap();
    assert_eq!(matched.len(), 2);
    assert_eq!(*log.lock().unwrap(), ["s:dup", "s:dup"]);
    assert_eq!(g.get("dup").map(|r| r.query.as_str()), Some("2 Main St"));
}

#[tokio::test]
async fn geography_lookup_uses_geographies_endpoint() {
    let transport = ScriptedTransport::new(|_, _| {
        Ok("\"7\",\"4600 Silver Hill Rd, Washington, DC, 20233\",\"Match\",\"Exact\",\
            \"4600 SILVER HILL RD, WASHINGTON, DC, 20233\",\"-76.92744,38.845985\",\
            \"76355984\",\"L\",\"24\",\"033\",\"802405\",\"1084\""
            .to_string())
    });
    let config = fast_config().geography(Geography::Census2020);
    let mut g = Geocoder::new(transport.clone(), config);
    g.add("7", GeocodeAddress::street("4600 Silver Hill Rd").zip("20233"), None);

    let matched = g.geocode(None).await.unwrap();
    let r = &matched[0];
    assert_eq!(r.state.as_deref(), Some("24"));
    assert_eq!(r.district.as_deref(), Some("033"));
    assert_eq!(r.tract.as_deref(), Some("802405"));
    assert_eq!(r.block.as_deref(), Some("1084"));

    let sub = &transport.submissions()[0];
    assert_eq!(sub.endpoint, Endpoint::Geographies);
    assert_eq!(sub.vintage.as_deref(), Some("420"));
}

// ─── Listener dispatch ─────────────────────────────────────────────────────────

#[tokio::test]
async fn listeners_fire_in_row_order() {
    let transport = ScriptedTransport::new(match_everything);
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut g = Geocoder::new(transport, fast_config());

    for id in ["x", "y"] {
        let async_log = log.clone();
        g.add_async(
            id,
            GeocodeAddress::street("1 Main St"),
            async_listener(move |r| {
                let log = async_log.clone();
                async move {
                    tokio::task::yield_now().await;
                    log.lock().unwrap().push(format!("a:{}", r.id));
                    Ok(())
                }
            }),
        )
        .await
        .unwrap();
        g.add_listener(id, recorder(log.clone(), "s"));
    }

    g.geocode(None).await.unwrap();
    assert_eq!(*log.lock().unwrap(), ["s:x", "a:x", "s:y", "a:y"]);
}

#[tokio::test]
async fn removed_listener_is_not_called() {
    let transport = ScriptedTransport::new(match_everything);
    let log = Arc::new(Mutex::new(Vec::new()));
    let listener = recorder(log.clone(), "s");
    let mut g = Geocoder::new(transport, fast_config());
    g.add("a", GeocodeAddress::street("1 Main St"), Some(listener.clone()));
    g.clear_listener("a", &listener);
    assert!(!g.has_listeners("a"));

    g.geocode(None).await.unwrap();
    assert!(log.lock().unwrap().is_empty());
    assert!(g.get("a").is_some());
}

#[tokio::test]
async fn failing_listener_aborts_remaining_rows() {
    let transport = ScriptedTransport::new(match_everything);
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut g = Geocoder::new(transport, fast_config());
    g.add(
        "a",
        GeocodeAddress::street("1 Main St"),
        Some(Arc::new(|r: &GeocodeResponse| -> Result<(), GeocodeError> {
            Err(GeocodeError::listener(&r.id, "listener rejected result"))
        })),
    );
    g.add("b", GeocodeAddress::street("2 Main St"), Some(recorder(log.clone(), "s")));

    let err = g.geocode(None).await.unwrap_err();
    assert!(matches!(err, GeocodeError::Listener { ref id, .. } if id == "a"));
    // cached before the listener ran; the next row never got there
    assert!(g.get("a").is_some());
    assert!(g.get("b").is_none());
    assert!(log.lock().unwrap().is_empty());
    assert!(!g.has_geocode_batch());
}

#[tokio::test]
async fn failing_async_listener_aborts_remaining_rows() {
    let transport = ScriptedTransport::new(match_everything);
    let hits = Arc::new(AtomicU32::new(0));
    let mut g = Geocoder::new(transport, fast_config());
    g.add_async(
        "a",
        GeocodeAddress::street("1 Main St"),
        async_listener(|r| async move {
            tokio::task::yield_now().await;
            Err(GeocodeError::listener(&r.id, "async listener rejected result"))
        }),
    )
    .await
    .unwrap();
    let counted = hits.clone();
    g.add_async(
        "b",
        GeocodeAddress::street("2 Main St"),
        async_listener(move |_| {
            let hits = counted.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )
    .await
    .unwrap();

    let err = g.geocode(None).await.unwrap_err();
    assert!(matches!(err, GeocodeError::Listener { ref id, .. } if id == "a"));
    assert!(g.get("a").is_some());
    assert!(g.get("b").is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn continue_policy_isolates_listener_failures() {
    let transport = ScriptedTransport::new(match_everything);
    let log = Arc::new(Mutex::new(Vec::new()));
    let config = fast_config().listener_failure(ListenerFailurePolicy::Continue);
    let mut g = Geocoder::new(transport, config);
    g.add(
        "a",
        GeocodeAddress::street("1 Main St"),
        Some(Arc::new(|r: &GeocodeResponse| -> Result<(), GeocodeError> {
            Err(GeocodeError::listener(&r.id, "listener rejected result"))
        })),
    );
    g.add("b", GeocodeAddress::street("2 Main St"), Some(recorder(log.clone(), "s")));

    let matched = g.geocode(None).await.unwrap();
    assert_eq!(matched.len(), 2);
    assert_eq!(*log.lock().unwrap(), ["s:b"]);
}

#[tokio::test]
async fn malformed_match_row_aborts() {
    let transport = ScriptedTransport::new(|_, _| {
        Ok([
            "\"a\",\"q\",\"Match\",\"Exact\",\"A\",\"not-a-coordinate\",\"R\",\"L\"".to_string(),
            match_line("b", "2 Main St", -77.0, 38.0),
        ]
        .join("\n"))
    });
    let mut g = Geocoder::new(transport, fast_config());
    g.add("a", GeocodeAddress::street("1 Main St"), None);
    g.add("b", GeocodeAddress::street("2 Main St"), None);

    let err = g.geocode(None).await.unwrap_err();
    assert!(matches!(err, GeocodeError::MalformedRow { .. }));
    assert!(g.get("b").is_none());
}

#[tokio::test]
async fn add_async_flushes_full_queue_and_resets_async_listeners() {
    let transport = ScriptedTransport::new(match_everything);
    let hits = Arc::new(AtomicU32::new(0));
    let mut g = Geocoder::new(transport.clone(), fast_config());

    for i in 0..MAX_BATCH_SIZE - 1 {
        g.add(i.to_string(), GeocodeAddress::street(format!("{i} Main St")), None);
    }
    // registered for an id that never gets queued
    let stray = hits.clone();
    g.add_async_listener(
        "never-sent",
        async_listener(move |_| {
            let hits = stray.clone();
            async move {
                hits.fetch_add(100, Ordering::SeqCst);
                Ok(())
            }
        }),
    );
    assert_eq!(transport.attempts(), 0);

    let last = hits.clone();
    g.add_async(
        "last",
        GeocodeAddress::street("10000 Main St"),
        async_listener(move |_| {
            let hits = last.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }),
    )
    .await
    .unwrap();

    assert_eq!(transport.attempts(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(!g.has_geocode_batch());
    assert!(!g.has_async_listeners("last"));
    assert!(!g.has_async_listeners("never-sent"));
    assert_eq!(g.cached_count(), MAX_BATCH_SIZE);
}

#[tokio::test]
async fn add_async_below_max_does_not_flush() {
    let transport = ScriptedTransport::new(match_everything);
    let mut g = Geocoder::new(transport.clone(), fast_config());
    g.add_async(
        "a",
        GeocodeAddress::street("1 Main St"),
        async_listener(|_| async { Ok(()) }),
    )
    .await
    .unwrap();
    assert_eq!(transport.attempts(), 0);
    assert!(g.has_async_listeners("a"));
    assert_eq!(g.current_batch_size(), 1);
}

// ─── Retry ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_failures_are_retried() {
    let transport = ScriptedTransport::new(|sub, attempt| {
        if attempt < 3 {
            Err(TransportError::Http("connection reset".into()))
        } else {
            match_everything(sub, attempt)
        }
    });
    let mut g = Geocoder::new(transport.clone(), fast_config());
    g.add("a", GeocodeAddress::street("1 Main St"), None);

    let matched = g.geocode(None).await.unwrap();
    assert_eq!(matched.len(), 1);
    assert_eq!(transport.attempts(), 3);

    // every attempt carried the same batch
    let subs = transport.submissions();
    assert!(subs.iter().all(|s| s == &subs[0]));
}

#[tokio::test]
async fn non_transient_errors_are_retried_too() {
    let transport = ScriptedTransport::new(|sub, attempt| {
        if attempt == 1 {
            Err(TransportError::Status {
                status: 400,
                body: "bad request".into(),
            })
        } else {
            match_everything(sub, attempt)
        }
    });
    let mut g = Geocoder::new(transport.clone(), fast_config());
    g.add("a", GeocodeAddress::street("1 Main St"), None);

    assert_eq!(g.geocode(None).await.unwrap().len(), 1);
    assert_eq!(transport.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_raise_request_error() {
    let transport =
        ScriptedTransport::new(|_, _| Err(TransportError::Timeout { ms: 60_000 }));
    let mut g = Geocoder::new(transport.clone(), GeocoderConfig::default());
    g.add("a", GeocodeAddress::street("1 Main St"), None);
    g.add("b", GeocodeAddress::street("2, Oak \"Ave\""), None);

    let started = tokio::time::Instant::now();
    let err = g.geocode(None).await.unwrap_err();
    let waited = started.elapsed();

    assert_eq!(transport.attempts(), 4);
    // three pauses of the 60s timeout, none after the last attempt
    assert!(waited >= Duration::from_secs(180), "waited {waited:?}");
    assert!(waited < Duration::from_secs(240), "waited {waited:?}");

    let req = err.request().expect("request error");
    assert_eq!(req.code(), "RequestError");
    assert_eq!(req.retries, 3);
    assert_eq!(req.timeout, Duration::from_millis(60_000));
    assert_eq!(req.benchmark, "4");
    assert_eq!(req.geography, None);
    assert_eq!(
        req.csv,
        "\"a\",\"1 Main St\",\"\",\"\",\"\"\n\"b\",\"2, Oak \"\"Ave\"\"\",\"\",\"\",\"\""
    );

    // the slice is consumed, not requeued
    assert!(!g.has_geocode_batch());
    assert!(!g.no_match("a"));
}
