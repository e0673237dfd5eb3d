//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（无需 broker 与数据库）
//! - Sink 隔离与重连行为

#[cfg(test)]
mod contract_tests {
    use contracts::{SinkError, RELATIONAL_TABLE};

    #[test]
    fn test_contract_constants() {
        assert_eq!(RELATIONAL_TABLE, "mqtt_data");
        assert_eq!(SinkError::unavailable("x").kind(), "unavailable");
    }
}

/// In-memory stand-ins for the cache and document store
#[cfg(test)]
mod support {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use contracts::{
        DataSink, InboundMessage, PushGatewayConfig, SensitiveString, SinkError,
    };
    use serde_json::Value;

    /// Key-value cache holding the last payload per key
    #[derive(Clone, Default)]
    pub struct MemoryCache {
        pub entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        pub writes: Arc<Mutex<u64>>,
        pub unreachable: bool,
        pub key: String,
    }

    impl MemoryCache {
        pub fn new(key: &str) -> Self {
            Self {
                key: key.to_string(),
                ..Default::default()
            }
        }

        pub fn get(&self) -> Option<Vec<u8>> {
            self.entries.lock().unwrap().get(&self.key).cloned()
        }
    }

    impl DataSink for MemoryCache {
        fn name(&self) -> &str {
            "cache"
        }

        async fn write(&mut self, message: &InboundMessage) -> Result<(), SinkError> {
            if self.unreachable {
                return Err(SinkError::connection_failed("connection refused"));
            }
            *self.writes.lock().unwrap() += 1;
            self.entries
                .lock()
                .unwrap()
                .insert(self.key.clone(), message.payload().to_vec());
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    /// Document collection
    #[derive(Clone, Default)]
    pub struct MemoryCollection {
        pub documents: Arc<Mutex<Vec<Value>>>,
    }

    impl DataSink for MemoryCollection {
        fn name(&self) -> &str {
            "document_store"
        }

        async fn write(&mut self, message: &InboundMessage) -> Result<(), SinkError> {
            self.documents.lock().unwrap().push(serde_json::json!({
                "topic": message.topic(),
                "message": message.payload_text(),
            }));
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    /// Requests seen by the fake push gateway
    pub type Published = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

    /// Start a fake push gateway answering every publish with `status`
    pub async fn push_gateway(status: StatusCode) -> (PushGatewayConfig, Published) {
        let published = Published::default();
        let app = Router::new()
            .route(
                "/api",
                post(
                    move |State(seen): State<Published>, headers: HeaderMap, body: String| async move {
                        let json: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
                        seen.lock().unwrap().push((headers, json));
                        (status, "{}")
                    },
                ),
            )
            .with_state(published.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (gateway_config(format!("http://{addr}/api")), published)
    }

    /// Push gateway configuration pointing at a port nothing listens on
    pub fn unreachable_gateway() -> PushGatewayConfig {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        gateway_config(format!("http://127.0.0.1:{port}/api"))
    }

    fn gateway_config(endpoint: String) -> PushGatewayConfig {
        PushGatewayConfig {
            endpoint,
            api_key: SensitiveString::from("test-key"),
            timeout_ms: 2000,
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::http::StatusCode;
    use contracts::{InboundMessage, SinkError, SinkResult};
    use dispatcher::{
        Dispatcher, MemoryBackend, PushGatewaySink, RelationalStoreSink, SinkHandle,
    };
    use subscription::{MockConnector, ScriptedConnect, ScriptedEvent, SubscriptionManager};
    use tokio::sync::mpsc;

    use crate::support::{push_gateway, unreachable_gateway, MemoryCache, MemoryCollection};

    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    struct Sinks {
        cache: MemoryCache,
        documents: MemoryCollection,
        rows: MemoryBackend,
    }

    fn dispatcher_with(
        cache: MemoryCache,
        rows: MemoryBackend,
        push: PushGatewaySink,
    ) -> (Dispatcher, Sinks) {
        let documents = MemoryCollection::default();
        let dispatcher = Dispatcher::with_handles(vec![
            SinkHandle::spawn(cache.clone(), 4, WRITE_TIMEOUT),
            SinkHandle::spawn(documents.clone(), 4, WRITE_TIMEOUT),
            SinkHandle::spawn(
                RelationalStoreSink::new("relational_store", rows.clone()),
                4,
                WRITE_TIMEOUT,
            ),
            SinkHandle::spawn(push, 4, WRITE_TIMEOUT),
        ]);
        (
            dispatcher,
            Sinks {
                cache,
                documents,
                rows,
            },
        )
    }

    /// Run the subscription until `count` messages have been dispatched
    async fn forward(
        connector: MockConnector,
        dispatcher: &Dispatcher,
        count: usize,
    ) -> Vec<Vec<SinkResult>> {
        let mut manager = SubscriptionManager::new(connector, Duration::from_secs(5));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let collected = async {
            let mut all = Vec::new();
            while all.len() < count {
                match rx.recv().await {
                    Some(results) => all.push(results),
                    None => break,
                }
            }
            all
        };

        let run = manager.run(|message| {
            let tx = tx.clone();
            async move {
                let results = dispatcher.dispatch(message).await;
                tx.send(results).map_err(|e| e.to_string())?;
                Ok::<_, String>(())
            }
        });

        tokio::select! {
            all = collected => all,
            result = run => panic!("subscription ended: {:?}", result.err()),
        }
    }

    /// Healthy path: every sink receives the message
    #[tokio::test]
    async fn test_e2e_all_sinks_succeed() {
        let (gateway, published) = push_gateway(StatusCode::OK).await;
        let push = PushGatewaySink::new("push_gateway", &gateway).unwrap();
        let (dispatcher, sinks) =
            dispatcher_with(MemoryCache::new("latest"), MemoryBackend::new(), push);

        let connector = MockConnector::new(vec![ScriptedConnect::messages(vec![
            InboundMessage::new("sensors/temp", "22.5"),
        ])]);

        let results = forward(connector, &dispatcher, 1).await;
        assert_eq!(results.len(), 1);
        let results = &results[0];

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(SinkResult::is_ok), "{results:?}");

        assert_eq!(sinks.cache.get(), Some(b"22.5".to_vec()));
        assert_eq!(
            *sinks.documents.documents.lock().unwrap(),
            vec![serde_json::json!({"topic": "sensors/temp", "message": "22.5"})]
        );
        assert_eq!(
            sinks.rows.rows(),
            vec![("sensors/temp".to_string(), "22.5".to_string())]
        );

        let published = published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let (headers, body) = &published[0];
        assert_eq!(headers["authorization"], "apikey test-key");
        assert_eq!(
            *body,
            serde_json::json!({
                "method": "publish",
                "params": {"channel": "sensors/temp", "data": "22.5"}
            })
        );
        drop(published);

        dispatcher.shutdown().await;
    }

    /// Unreachable gateway fails alone
    #[tokio::test]
    async fn test_e2e_gateway_unreachable_is_isolated() {
        let push = PushGatewaySink::new("push_gateway", &unreachable_gateway()).unwrap();
        let (dispatcher, sinks) =
            dispatcher_with(MemoryCache::new("latest"), MemoryBackend::new(), push);

        let connector = MockConnector::new(vec![ScriptedConnect::messages(vec![
            InboundMessage::new("sensors/temp", "22.5"),
        ])]);

        let results = forward(connector, &dispatcher, 1).await.remove(0);

        let names: Vec<_> = results.iter().map(|r| r.sink_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["cache", "document_store", "relational_store", "push_gateway"]
        );
        assert!(results[..3].iter().all(SinkResult::is_ok));
        assert_eq!(results[3].error().map(SinkError::kind), Some("connection_failed"));

        assert!(sinks.cache.get().is_some());
        assert_eq!(sinks.documents.documents.lock().unwrap().len(), 1);
        assert_eq!(sinks.rows.rows().len(), 1);

        dispatcher.shutdown().await;
    }

    /// Non-200 from the gateway is reported with its status
    #[tokio::test]
    async fn test_e2e_gateway_rejection() {
        let (gateway, _) = push_gateway(StatusCode::SERVICE_UNAVAILABLE).await;
        let push = PushGatewaySink::new("push_gateway", &gateway).unwrap();
        let (dispatcher, sinks) =
            dispatcher_with(MemoryCache::new("latest"), MemoryBackend::new(), push);

        let results = dispatcher
            .dispatch(InboundMessage::new("sensors/temp", "1"))
            .await;

        match results[3].error() {
            Some(SinkError::PublishRejected { status, .. }) => assert_eq!(*status, 503),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sinks.rows.rows().len(), 1);

        dispatcher.shutdown().await;
    }

    /// Redelivery is not deduplicated
    #[tokio::test]
    async fn test_e2e_duplicate_delivery_writes_twice() {
        let (gateway, published) = push_gateway(StatusCode::OK).await;
        let push = PushGatewaySink::new("push_gateway", &gateway).unwrap();
        let (dispatcher, sinks) =
            dispatcher_with(MemoryCache::new("latest"), MemoryBackend::new(), push);

        let message = InboundMessage::new("sensors/temp", "dup");
        let connector = MockConnector::new(vec![ScriptedConnect::messages(vec![
            message.clone(),
            message,
        ])]);

        let results = forward(connector, &dispatcher, 2).await;
        assert!(results.iter().flatten().all(SinkResult::is_ok));

        assert_eq!(sinks.documents.documents.lock().unwrap().len(), 2);
        assert_eq!(sinks.rows.rows().len(), 2);
        assert_eq!(published.lock().unwrap().len(), 2);
        assert_eq!(*sinks.cache.writes.lock().unwrap(), 2);
        assert_eq!(sinks.cache.get(), Some(b"dup".to_vec()));

        dispatcher.shutdown().await;
    }

    /// Cache overwritten by the latest message regardless of topic
    #[tokio::test]
    async fn test_e2e_cache_keeps_last_payload() {
        let (gateway, _) = push_gateway(StatusCode::OK).await;
        let push = PushGatewaySink::new("push_gateway", &gateway).unwrap();
        let (dispatcher, sinks) =
            dispatcher_with(MemoryCache::new("latest"), MemoryBackend::new(), push);

        let connector = MockConnector::new(vec![ScriptedConnect::messages(vec![
            InboundMessage::new("sensors/a", "first"),
            InboundMessage::new("sensors/b", "second"),
        ])]);

        forward(connector, &dispatcher, 2).await;
        assert_eq!(sinks.cache.get(), Some(b"second".to_vec()));
        assert_eq!(sinks.cache.entries.lock().unwrap().len(), 1);

        dispatcher.shutdown().await;
    }

    /// A failing cache never blocks the other sinks
    #[tokio::test]
    async fn test_e2e_failing_cache_does_not_block() {
        let (gateway, published) = push_gateway(StatusCode::OK).await;
        let push = PushGatewaySink::new("push_gateway", &gateway).unwrap();
        let mut cache = MemoryCache::new("latest");
        cache.unreachable = true;
        let (dispatcher, sinks) = dispatcher_with(cache, MemoryBackend::new(), push);

        let connector = MockConnector::new(vec![ScriptedConnect::messages(vec![
            InboundMessage::new("t", "1"),
            InboundMessage::new("t", "2"),
            InboundMessage::new("t", "3"),
        ])]);

        let results = forward(connector, &dispatcher, 3).await;
        for per_message in &results {
            assert_eq!(per_message[0].error().map(SinkError::kind), Some("connection_failed"));
            assert!(per_message[1..].iter().all(SinkResult::is_ok));
        }
        assert_eq!(sinks.rows.rows().len(), 3);
        assert_eq!(published.lock().unwrap().len(), 3);

        let metrics = dispatcher.metrics();
        assert_eq!(metrics[0].1.failure_count, 3);
        assert_eq!(metrics[2].1.write_count, 3);

        dispatcher.shutdown().await;
    }

    /// Rejected inserts leave no open relational connections
    #[tokio::test]
    async fn test_e2e_relational_failures_release_connections() {
        let (gateway, _) = push_gateway(StatusCode::OK).await;
        let push = PushGatewaySink::new("push_gateway", &gateway).unwrap();
        let (dispatcher, sinks) = dispatcher_with(
            MemoryCache::new("latest"),
            MemoryBackend::rejecting_inserts(),
            push,
        );

        for i in 0..10 {
            let results = dispatcher
                .dispatch(InboundMessage::new("t", format!("{i}")))
                .await;
            assert_eq!(results[2].error().map(SinkError::kind), Some("write_failed"));
        }

        assert_eq!(sinks.rows.connections_opened(), 10);
        assert_eq!(sinks.rows.open_connections(), 0);
        assert!(sinks.rows.rows().is_empty());

        dispatcher.shutdown().await;
    }

    /// Feed down twice, then up: three attempts spaced by the backoff
    #[tokio::test(start_paused = true)]
    async fn test_e2e_reconnect_with_backoff() {
        let rows = MemoryBackend::new();
        let documents = MemoryCollection::default();
        let dispatcher = Dispatcher::with_handles(vec![
            SinkHandle::spawn(documents.clone(), 4, WRITE_TIMEOUT),
            SinkHandle::spawn(
                RelationalStoreSink::new("relational_store", rows.clone()),
                4,
                WRITE_TIMEOUT,
            ),
        ]);

        let connector = MockConnector::new(vec![
            ScriptedConnect::fail("connection refused"),
            ScriptedConnect::fail("connection refused"),
            ScriptedConnect::session(vec![
                ScriptedEvent::Message(InboundMessage::new("sensors/temp", "up")),
            ]),
        ]);
        let attempts = connector.attempts();

        let results = forward(connector, &dispatcher, 1).await;
        assert!(results[0].iter().all(SinkResult::is_ok));

        let times = attempts.times();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_secs(5));
        assert!(times[2] - times[1] >= Duration::from_secs(5));
        assert_eq!(rows.rows().len(), 1);
        assert_eq!(documents.documents.lock().unwrap().len(), 1);

        dispatcher.shutdown().await;
    }

    /// Mid-stream loss re-enters the backoff and later messages still flow
    #[tokio::test(start_paused = true)]
    async fn test_e2e_connection_loss_resumes() {
        let rows = MemoryBackend::new();
        let dispatcher = Dispatcher::with_handles(vec![SinkHandle::spawn(
            RelationalStoreSink::new("relational_store", rows.clone()),
            4,
            WRITE_TIMEOUT,
        )]);

        let connector = MockConnector::new(vec![
            ScriptedConnect::session(vec![
                ScriptedEvent::Message(InboundMessage::new("t", "before")),
                ScriptedEvent::Drop("keep-alive timeout".into()),
            ]),
            ScriptedConnect::messages(vec![InboundMessage::new("t", "after")]),
        ]);
        let attempts = connector.attempts();

        forward(connector, &dispatcher, 2).await;

        let payloads: Vec<_> = rows.rows().into_iter().map(|(_, m)| m).collect();
        assert_eq!(payloads, vec!["before", "after"]);
        assert_eq!(attempts.count(), 2);

        dispatcher.shutdown().await;
    }

    /// A handler error ends the subscription
    #[tokio::test]
    async fn test_e2e_handler_failure_propagates() {
        let seen = Arc::new(Mutex::new(0u32));
        let connector = MockConnector::new(vec![ScriptedConnect::messages(vec![
            InboundMessage::new("t", "1"),
            InboundMessage::new("t", "2"),
        ])]);

        let mut manager = SubscriptionManager::new(connector, Duration::from_secs(5));
        let counter = Arc::clone(&seen);
        let result = manager
            .run(move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    *counter.lock().unwrap() += 1;
                    Err::<(), _>("dispatcher invariant broken".to_string())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(*seen.lock().unwrap(), 1);
    }
}

#[cfg(test)]
mod config_tests {
    use std::collections::HashMap;

    use config_loader::ConfigLoader;
    use dispatcher::create_dispatcher;

    fn env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("MQTT_BROKER", "broker.local"),
            ("MQTT_TOPIC", "sensors/+/temp"),
            ("REDIS_HOST", "localhost"),
            ("REDIS_TOPIC", "latest"),
            ("MONGODB_URI", "mongodb://localhost:27017"),
            ("MONGODB_DB", "bridge"),
            ("MONGODB_COLLECTION", "messages"),
            ("POSTGRES_URI", "postgres://bridge@localhost/bridge"),
            ("CENTRIFUGO_API_ENDPOINT", "http://localhost:8000/api"),
            ("CENTRIFUGO_API_KEY", "secret"),
        ])
    }

    /// Environment config builds all four sinks without contacting any backend
    #[tokio::test]
    async fn test_env_config_builds_dispatcher() {
        let vars = env();
        let config =
            ConfigLoader::load_from_vars(|name| vars.get(name).map(|v| v.to_string())).unwrap();

        let dispatcher = create_dispatcher(&config).await.unwrap();
        assert_eq!(
            dispatcher.sink_names(),
            vec!["cache", "document_store", "relational_store", "push_gateway"]
        );
        dispatcher.shutdown().await;
    }

    #[test]
    fn test_missing_env_names_variable() {
        let mut vars = env();
        vars.remove("CENTRIFUGO_API_KEY");

        let err = ConfigLoader::load_from_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("CENTRIFUGO_API_KEY"));
    }
}
