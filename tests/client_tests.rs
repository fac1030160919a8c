use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use chrono::{Datelike, TimeZone, Utc};
use iam_audit::audit::{evaluate, FindingKind, KeyStatus, Thresholds};
use iam_audit::aws::{collect_snapshots, Credentials, IamClient, IdentitySource};
use iam_audit::error::AuditError;
use serde_json::json;

/// Canned-response stub for the IAM Query API.
///
/// Routes on (Action, UserName-or-AccessKeyId, Marker) parsed from the form
/// body; unknown routes answer HTTP 400 like a real validation error would.
struct StubIam {
    addr: SocketAddr,
}

impl StubIam {
    async fn start(routes: HashMap<String, String>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let routes = Arc::new(routes);

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };

                let io = TokioIo::new(stream);
                let routes = routes.clone();

                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let routes = routes.clone();
                        async move { handle_request(req, routes).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        eprintln!("Error serving connection: {:?}", err);
                    }
                });
            }
        });

        // Give the listener task a moment to start accepting
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        Ok(StubIam { addr })
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    routes: Arc<HashMap<String, String>>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let body = req.into_body().collect().await?.to_bytes();
    let form = parse_form(&body);

    let action = form.get("Action").cloned().unwrap_or_default();
    let subject = form
        .get("UserName")
        .or_else(|| form.get("AccessKeyId"))
        .cloned()
        .unwrap_or_default();
    let marker = form.get("Marker").cloned().unwrap_or_default();
    let key = format!("{}|{}|{}", action, subject, marker);

    let response = match routes.get(&key) {
        Some(canned) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(canned.clone())))
            .unwrap(),
        None => Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(
                json!({"Error": {"Code": "ValidationError", "Message": format!("no canned response for {}", key)}})
                    .to_string(),
            )))
            .unwrap(),
    };
    Ok(response)
}

fn parse_form(body: &[u8]) -> HashMap<String, String> {
    String::from_utf8_lossy(body)
        .split('&')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

fn test_credentials() -> Credentials {
    Credentials {
        access_key_id: "AKIDEXAMPLE".to_string(),
        secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
        session_token: None,
    }
}

fn list_users_page_one() -> String {
    json!({
        "ListUsersResponse": {
            "ListUsersResult": {
                "Users": [
                    {
                        "UserName": "alice",
                        "UserId": "AIDAALICE",
                        "Arn": "arn:aws:iam::111122223333:user/alice",
                        "CreateDate": 1500000000.0
                    },
                    {
                        "UserName": "bob",
                        "UserId": "AIDABOB",
                        "Arn": "arn:aws:iam::111122223333:user/bob",
                        "CreateDate": 1550000000.0
                    }
                ],
                "IsTruncated": true,
                "Marker": "m1"
            },
            "ResponseMetadata": {"RequestId": "req-1"}
        }
    })
    .to_string()
}

fn list_users_page_two() -> String {
    json!({
        "ListUsersResponse": {
            "ListUsersResult": {
                "Users": [
                    {
                        "UserName": "carol",
                        "UserId": "AIDACAROL",
                        "Arn": "arn:aws:iam::111122223333:user/carol",
                        "CreateDate": 1560000000.0
                    }
                ],
                "IsTruncated": false
            },
            "ResponseMetadata": {"RequestId": "req-2"}
        }
    })
    .to_string()
}

fn mfa_devices(serials: &[&str]) -> String {
    let devices: Vec<_> = serials
        .iter()
        .map(|s| json!({"UserName": "bob", "SerialNumber": s, "EnableDate": 1555000000.0}))
        .collect();
    json!({
        "ListMFADevicesResponse": {
            "ListMFADevicesResult": {"MFADevices": devices, "IsTruncated": false},
            "ResponseMetadata": {"RequestId": "req-3"}
        }
    })
    .to_string()
}

fn access_keys(user: &str, entries: &[(&str, &str, f64)]) -> String {
    let keys: Vec<_> = entries
        .iter()
        .map(|(id, status, created)| {
            json!({
                "UserName": user,
                "AccessKeyId": id,
                "Status": status,
                "CreateDate": created
            })
        })
        .collect();
    json!({
        "ListAccessKeysResponse": {
            "ListAccessKeysResult": {"AccessKeyMetadata": keys, "IsTruncated": false},
            "ResponseMetadata": {"RequestId": "req-4"}
        }
    })
    .to_string()
}

fn last_used(date: Option<f64>) -> String {
    let inner = match date {
        Some(epoch) => json!({
            "LastUsedDate": epoch,
            "ServiceName": "s3",
            "Region": "us-east-1"
        }),
        None => json!({"ServiceName": "N/A", "Region": "N/A"}),
    };
    json!({
        "GetAccessKeyLastUsedResponse": {
            "GetAccessKeyLastUsedResult": {"AccessKeyLastUsed": inner, "UserName": "alice"},
            "ResponseMetadata": {"RequestId": "req-5"}
        }
    })
    .to_string()
}

fn account_routes() -> HashMap<String, String> {
    let mut routes = HashMap::new();
    routes.insert("ListUsers||".to_string(), list_users_page_one());
    routes.insert("ListUsers||m1".to_string(), list_users_page_two());
    routes.insert("ListMFADevices|alice|".to_string(), mfa_devices(&[]));
    routes.insert(
        "ListMFADevices|bob|".to_string(),
        mfa_devices(&["arn:aws:iam::111122223333:mfa/bob"]),
    );
    routes.insert("ListMFADevices|carol|".to_string(), mfa_devices(&[]));
    routes.insert(
        "ListAccessKeys|alice|".to_string(),
        access_keys("alice", &[("AKIAALICEEXAMPLE01", "Active", 1600000000.0)]),
    );
    routes.insert("ListAccessKeys|bob|".to_string(), access_keys("bob", &[]));
    routes.insert(
        "ListAccessKeys|carol|".to_string(),
        access_keys("carol", &[("AKIACAROLEXAMPLE01", "Inactive", 1400000000.0)]),
    );
    routes.insert(
        "GetAccessKeyLastUsed|AKIAALICEEXAMPLE01|".to_string(),
        last_used(Some(1610000000.0)),
    );
    routes.insert(
        "GetAccessKeyLastUsed|AKIACAROLEXAMPLE01|".to_string(),
        last_used(None),
    );
    routes
}

#[tokio::test]
async fn test_collect_snapshots_walks_the_whole_account() {
    let stub = StubIam::start(account_routes()).await.unwrap();
    let client =
        IamClient::with_endpoint(test_credentials(), "us-east-1", &stub.url()).unwrap();

    let snapshots = collect_snapshots(&client).await.unwrap();

    // Pagination delivered all three users
    assert_eq!(snapshots.len(), 3);
    let names: Vec<&str> = snapshots.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["alice", "bob", "carol"]);

    let alice = &snapshots["alice"];
    assert!(alice.mfa_devices.is_empty());
    assert_eq!(alice.access_keys.len(), 1);
    assert_eq!(alice.access_keys[0].key_id, "AKIAALICEEXAMPLE01");
    assert_eq!(alice.access_keys[0].status, KeyStatus::Active);
    assert_eq!(
        alice.access_keys[0].created_at,
        Utc.timestamp_opt(1600000000, 0).unwrap()
    );
    assert_eq!(
        alice.access_keys[0].last_used_at,
        Some(Utc.timestamp_opt(1610000000, 0).unwrap())
    );

    let bob = &snapshots["bob"];
    assert_eq!(bob.mfa_devices.len(), 1);
    assert!(bob.access_keys.is_empty());
    assert_eq!(bob.created_at.year(), 2019);

    // Never-used key comes back with no last-used timestamp
    let carol = &snapshots["carol"];
    assert_eq!(carol.access_keys[0].status, KeyStatus::Inactive);
    assert_eq!(carol.access_keys[0].last_used_at, None);
}

#[tokio::test]
async fn test_fetched_snapshots_evaluate_end_to_end() {
    let stub = StubIam::start(account_routes()).await.unwrap();
    let client =
        IamClient::with_endpoint(test_credentials(), "us-east-1", &stub.url()).unwrap();

    let snapshots = collect_snapshots(&client).await.unwrap();
    let findings = evaluate(&snapshots, Utc::now(), &Thresholds::default()).unwrap();

    // alice: no MFA, ancient key that is both old and idle.
    // bob: MFA present, no keys.
    // carol: no MFA; her key is inactive so it produces nothing.
    let kinds: Vec<(&str, FindingKind)> = findings
        .iter()
        .map(|f| (f.user_name.as_str(), f.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("alice", FindingKind::NoMfa),
            ("alice", FindingKind::OldAccessKey),
            ("alice", FindingKind::UnusedAccessKey),
            ("carol", FindingKind::NoMfa),
        ]
    );
}

#[tokio::test]
async fn test_api_error_aborts_collection() {
    // No canned routes: every call fails validation
    let stub = StubIam::start(HashMap::new()).await.unwrap();
    let client =
        IamClient::with_endpoint(test_credentials(), "us-east-1", &stub.url()).unwrap();

    let result = collect_snapshots(&client).await;
    match result {
        Err(AuditError::Fetch(message)) => {
            assert!(message.contains("ListUsers"), "unexpected message: {}", message);
        }
        other => panic!("expected fetch error, got {:?}", other.map(|m| m.len())),
    }
}

#[tokio::test]
async fn test_last_used_absent_maps_to_none() {
    let stub = StubIam::start(account_routes()).await.unwrap();
    let client =
        IamClient::with_endpoint(test_credentials(), "us-east-1", &stub.url()).unwrap();

    let last = client
        .access_key_last_used("AKIACAROLEXAMPLE01")
        .await
        .unwrap();
    assert_eq!(last, None);

    let last = client
        .access_key_last_used("AKIAALICEEXAMPLE01")
        .await
        .unwrap();
    assert_eq!(last, Some(Utc.timestamp_opt(1610000000, 0).unwrap()));
}
