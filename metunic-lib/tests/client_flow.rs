//! Session and retry behaviour of the registrar client, driven by a
//! scripted in-memory transport.

use async_trait::async_trait;
use metunic_lib::{
    ApiRequest, AuditRecord, AuditSink, ClientConfig, CookieJar, Credentials, HttpRequest,
    HttpResponse, MemorySessionStore, MetunicError, RegistrarClient, SessionStore, Transport,
    UNRECOGNISED_CODE,
};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use url::Url;

const BASE: &str = "https://registrar.test/api";

const OK_EMPTY: &str = r#"{"messageCode":1,"messageText":"OK","result":{}}"#;
const EXPIRED: &str = r#"{"messageCode":3,"messageText":"Oturum süresi doldu"}"#;
const VALID: &str = r#"{"messageCode":1,"result":{"valid":true}}"#;
const INVALID: &str = r#"{"messageCode":1,"result":{"valid":false}}"#;

#[derive(Clone)]
struct Reply {
    body: Option<String>,
    set_cookie: Option<String>,
}

fn json_reply(body: &str) -> Reply {
    Reply {
        body: Some(body.to_string()),
        set_cookie: None,
    }
}

fn login_reply() -> Reply {
    Reply {
        body: Some(OK_EMPTY.to_string()),
        set_cookie: Some("SESSID=fresh; Path=/".to_string()),
    }
}

fn connection_failure() -> Reply {
    Reply {
        body: None,
        set_cookie: None,
    }
}

/// Replays canned replies per `METHOD /path`; the last reply repeats.
#[derive(Default)]
struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<(String, HttpRequest)>>,
    cookies: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self::default()
    }

    fn route(self, key: &str, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(key.to_string(), replies.into_iter().collect());
        self
    }

    fn hits(&self, key: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .count()
    }

    fn total(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Cookie header each request to `key` carried, in order.
    fn cookies_sent(&self, key: &str) -> Vec<Option<String>> {
        self.cookies
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, cookie)| cookie.clone())
            .collect()
    }

    fn last_request(&self, key: &str) -> Option<HttpRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, request)| request.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        request: &HttpRequest,
        jar: &mut CookieJar,
    ) -> Result<HttpResponse, MetunicError> {
        let url = Url::parse(&request.url).unwrap();
        let path = url.path().trim_start_matches("/api").to_string();
        let key = format!("{} {}", request.method, path);
        self.requests
            .lock()
            .unwrap()
            .push((key.clone(), request.clone()));
        self.cookies
            .lock()
            .unwrap()
            .push((key.clone(), jar.cookie_header(&url)));

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            let queue = routes
                .get_mut(&key)
                .unwrap_or_else(|| panic!("unexpected request {}", key));
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue[0].clone()
            }
        };

        if let Some(cookie) = &reply.set_cookie {
            jar.store_set_cookie(cookie, &url);
        }
        match reply.body {
            Some(body) => Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body,
            }),
            None => Err(MetunicError::connection("connection refused")),
        }
    }
}

fn creds() -> Credentials {
    Credentials::new("bayi@example.com", "hunter2")
}

/// A store holding a cookie from an earlier run for `creds()`.
fn store_with_old_session() -> Arc<MemorySessionStore> {
    let mut jar = CookieJar::new();
    jar.store_set_cookie("SESSID=old; Path=/", &Url::parse(BASE).unwrap());
    Arc::new(MemorySessionStore::new().with_jar(creds().session_key(BASE), jar))
}

fn client(transport: &Arc<ScriptedTransport>, store: Arc<dyn SessionStore>) -> RegistrarClient {
    RegistrarClient::with_parts(
        ClientConfig::default().with_base_url(BASE),
        transport.clone(),
        store,
    )
}

#[tokio::test]
async fn test_success_envelope_returns_result() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route(
                "GET /services/queried-services",
                vec![json_reply(r#"{"messageCode":1,"result":{"id":42}}"#)],
            ),
    );
    let client = client(&transport, store_with_old_session());

    let value = client
        .call(
            &ApiRequest::get("/services/queried-services").param("domainName", "example.com"),
            Some(&creds()),
        )
        .await
        .unwrap();

    assert_eq!(value, json!({"id": 42}));
    assert_eq!(transport.hits("POST /login/auth"), 0);
}

#[tokio::test]
async fn test_expired_session_is_retried_exactly_once() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route("POST /login/auth", vec![login_reply()])
            .route(
                "POST /services/7/renew-duration",
                vec![json_reply(EXPIRED), json_reply(OK_EMPTY)],
            ),
    );
    let client = client(&transport, store_with_old_session());

    let value = client
        .call(
            &ApiRequest::post("/services/7/renew-duration").param("duration", 1),
            Some(&creds()),
        )
        .await
        .unwrap();

    assert_eq!(value, json!({}));
    assert_eq!(transport.hits("POST /services/7/renew-duration"), 2);
    assert_eq!(transport.hits("POST /login/auth"), 1);
    assert_eq!(transport.hits("GET /session/check"), 1);
    assert_eq!(transport.total(), 4);
}

#[tokio::test]
async fn test_float_expiry_code_is_retried() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route("POST /login/auth", vec![login_reply()])
            .route(
                "GET /services/7/tld/info",
                vec![
                    json_reply(r#"{"messageCode":3.0,"messageText":"Oturum yok"}"#),
                    json_reply(OK_EMPTY),
                ],
            ),
    );
    let client = client(&transport, store_with_old_session());

    let value = client
        .call(&ApiRequest::get("/services/7/tld/info"), Some(&creds()))
        .await
        .unwrap();

    assert_eq!(value, json!({}));
    assert_eq!(transport.hits("GET /services/7/tld/info"), 2);
    assert_eq!(transport.hits("POST /login/auth"), 1);
}

#[tokio::test]
async fn test_unrecognised_code_fails_without_retry() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route("POST /login/auth", vec![login_reply()])
            .route(
                "POST /services/7/transfer/lock",
                vec![json_reply(r#"{"messageCode":"ERR","messageText":"Yetkisiz"}"#)],
            ),
    );
    let client = client(&transport, store_with_old_session());

    let err = client
        .call(&ApiRequest::post("/services/7/transfer/lock"), Some(&creds()))
        .await
        .unwrap_err();

    match err {
        MetunicError::ApiError { code, message } => {
            assert_eq!(code, UNRECOGNISED_CODE);
            assert_eq!(message, "Yetkisiz");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(transport.hits("POST /services/7/transfer/lock"), 1);
    assert_eq!(transport.hits("POST /login/auth"), 0);
}

#[tokio::test]
async fn test_retry_uses_the_fresh_session_cookie() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route("POST /login/auth", vec![login_reply()])
            .route(
                "GET /services/7/tld/info",
                vec![json_reply(EXPIRED), json_reply(OK_EMPTY)],
            ),
    );
    let client = client(&transport, store_with_old_session());

    client
        .call(&ApiRequest::get("/services/7/tld/info"), Some(&creds()))
        .await
        .unwrap();

    assert_eq!(
        transport.cookies_sent("GET /services/7/tld/info"),
        vec![Some("SESSID=old".to_string()), Some("SESSID=fresh".to_string())]
    );

    let login = transport.last_request("POST /login/auth").unwrap();
    assert_eq!(
        login.body.as_deref(),
        Some("username=bayi%40example.com&password=hunter2")
    );
}

#[tokio::test]
async fn test_second_expiry_is_final() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("POST /login/auth", vec![login_reply()])
            .route(
                "GET /services/7/tr/nameservers/list",
                vec![
                    json_reply(r#"{"messageCode":3,"messageText":"first"}"#),
                    json_reply(r#"{"messageCode":3,"messageText":"second"}"#),
                ],
            ),
    );
    let client = client(&transport, Arc::new(MemorySessionStore::new()));

    let err = client
        .call(
            &ApiRequest::get("/services/7/tr/nameservers/list"),
            Some(&creds()),
        )
        .await
        .unwrap_err();

    match err {
        MetunicError::ApiError { code, message } => {
            assert_eq!(code, 3);
            assert_eq!(message, "second");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(transport.hits("GET /services/7/tr/nameservers/list"), 2);
    assert_eq!(transport.hits("POST /login/auth"), 2);
    assert_eq!(transport.hits("GET /session/check"), 0);
}

#[tokio::test]
async fn test_empty_jar_logs_in_without_session_check() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("POST /login/auth", vec![login_reply()])
            .route("GET /definitions/countries", vec![json_reply(OK_EMPTY)]),
    );
    let client = client(&transport, Arc::new(MemorySessionStore::new()));

    client
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap();

    assert_eq!(transport.hits("GET /session/check"), 0);
    assert_eq!(transport.hits("POST /login/auth"), 1);
}

#[tokio::test]
async fn test_invalid_session_check_triggers_login() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(INVALID)])
            .route("POST /login/auth", vec![login_reply()])
            .route("GET /definitions/countries", vec![json_reply(OK_EMPTY)]),
    );
    let client = client(&transport, store_with_old_session());

    client
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap();

    assert_eq!(transport.hits("GET /session/check"), 1);
    assert_eq!(transport.hits("POST /login/auth"), 1);
    assert_eq!(transport.hits("GET /definitions/countries"), 1);
}

#[tokio::test]
async fn test_failed_login_surfaces_registrar_text() {
    let transport = Arc::new(ScriptedTransport::new().route(
        "POST /login/auth",
        vec![json_reply(
            r#"{"messageCode":2,"messageText":"Kullanıcı adı veya şifre hatalı"}"#,
        )],
    ));
    let client = client(&transport, Arc::new(MemorySessionStore::new()));

    let err = client
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Kullanıcı adı veya şifre hatalı");
    assert_eq!(transport.hits("GET /definitions/countries"), 0);
}

#[tokio::test]
async fn test_malformed_body_is_not_retried() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route(
                "GET /definitions/countries",
                vec![json_reply("<html>Maintenance</html>")],
            ),
    );
    let client = client(&transport, store_with_old_session());

    let err = client
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap_err();

    assert!(matches!(err, MetunicError::MalformedResponse { .. }));
    assert_eq!(transport.hits("GET /definitions/countries"), 1);
    assert_eq!(transport.hits("POST /login/auth"), 0);
}

#[tokio::test]
async fn test_connection_error_is_surfaced_once() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route("GET /definitions/countries", vec![connection_failure()]),
    );
    let client = client(&transport, store_with_old_session());

    let err = client
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap_err();

    assert!(err.is_connection_error());
    assert_eq!(transport.hits("GET /definitions/countries"), 1);
}

#[tokio::test]
async fn test_failed_session_check_falls_back_to_login() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![connection_failure()])
            .route("POST /login/auth", vec![login_reply()])
            .route("GET /definitions/countries", vec![json_reply(OK_EMPTY)]),
    );
    let client = client(&transport, store_with_old_session());

    client
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap();

    assert_eq!(transport.hits("POST /login/auth"), 1);
}

#[tokio::test]
async fn test_session_survives_a_new_client() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route("POST /login/auth", vec![login_reply()])
            .route("GET /definitions/countries", vec![json_reply(OK_EMPTY)]),
    );
    let store = Arc::new(MemorySessionStore::new());

    client(&transport, store.clone())
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap();
    client(&transport, store.clone())
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap();

    assert_eq!(transport.hits("POST /login/auth"), 1);
    assert_eq!(transport.hits("GET /session/check"), 1);

    let jar = store.load(&creds().session_key(BASE)).unwrap().unwrap();
    assert_eq!(jar.len(), 1);
}

#[tokio::test]
async fn test_forget_session_forces_a_new_login() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route("POST /login/auth", vec![login_reply()])
            .route("GET /definitions/countries", vec![json_reply(OK_EMPTY)]),
    );
    let store = store_with_old_session();
    let client = client(&transport, store.clone());

    client.forget_session(&creds()).await;
    assert!(store.load(&creds().session_key(BASE)).unwrap().is_none());

    client
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap();

    assert_eq!(transport.hits("GET /session/check"), 0);
    assert_eq!(transport.hits("POST /login/auth"), 1);
}

#[tokio::test]
async fn test_concurrent_calls_share_one_login() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("GET /session/check", vec![json_reply(VALID)])
            .route("POST /login/auth", vec![login_reply()])
            .route("GET /definitions/countries", vec![json_reply(OK_EMPTY)]),
    );
    let client = client(&transport, Arc::new(MemorySessionStore::new()));
    let request = ApiRequest::get("/definitions/countries");
    let creds = creds();

    let (a, b) = tokio::join!(
        client.call(&request, Some(&creds)),
        client.call(&request, Some(&creds))
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(transport.hits("POST /login/auth"), 1);
    assert_eq!(transport.hits("GET /definitions/countries"), 2);
}

#[derive(Default)]
struct CollectingSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl AuditSink for CollectingSink {
    fn record(&self, record: &AuditRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

#[tokio::test]
async fn test_audit_records_never_contain_the_password() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(
                "POST /login/auth",
                vec![Reply {
                    body: Some(
                        r#"{"messageCode":1,"result":{"user":"bayi@example.com","echo":"hunter2"}}"#
                            .to_string(),
                    ),
                    set_cookie: Some("SESSID=fresh; Path=/".to_string()),
                }],
            )
            .route("GET /definitions/countries", vec![json_reply(OK_EMPTY)]),
    );
    let sink = Arc::new(CollectingSink::default());
    let client = client(&transport, Arc::new(MemorySessionStore::new())).with_audit_sink(sink.clone());

    client
        .call(&ApiRequest::get("/definitions/countries"), Some(&creds()))
        .await
        .unwrap();

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action, "POST /login/auth");
    for record in records.iter() {
        let serialized = serde_json::to_string(record).unwrap();
        assert!(!serialized.contains("hunter2"), "leaked: {}", serialized);
        assert_eq!(
            record.credentials.as_ref().map(|c| c.password),
            Some("********")
        );
    }
    assert_eq!(records[0].request["params"]["password"], "********");
}
