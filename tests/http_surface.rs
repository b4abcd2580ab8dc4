//! Requests against a running daemon.

mod common;

use common::{test_config, with_running, FakeActivation, API_KEY};
use futures_util::{SinkExt, StreamExt};
use mgmtd::config::FeatureFlags;
use mgmtd::Daemon;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

fn redfish_daemon(assets: &std::path::Path) -> Daemon {
    let mut config = test_config(FeatureFlags {
        static_hosting: true,
        redfish: true,
        dbus_rest: true,
        host_serial_websocket: true,
        ibm_management_console: true,
        ..FeatureFlags::default()
    });
    config.assets.root = assets.to_path_buf();
    Daemon::new(config).with_activation(FakeActivation::none())
}

#[tokio::test]
async fn static_and_public_routes_skip_authentication() {
    let assets = common::asset_dir();
    let daemon = redfish_daemon(assets.path());

    let code = with_running(&daemon, |addr| async move {
        let index = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        assert_eq!(index.status(), 200);
        assert_eq!(
            index.headers()["content-type"],
            "text/html;charset=UTF-8"
        );
        assert_eq!(index.text().await.unwrap(), "<html>mgmtd</html>");

        let script = reqwest::get(format!("http://{}/js/app.js", addr)).await.unwrap();
        assert_eq!(script.status(), 200);

        let root: Value = reqwest::get(format!("http://{}/redfish/v1", addr))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(root["Id"], "RootService");
        assert!(root.get("AggregationService").is_none());
    })
    .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn awkward_asset_names_are_skipped_not_fatal() {
    let assets = common::asset_dir();
    common::write(assets.path(), ":weird.txt", "colon");
    common::write(assets.path(), "*.txt", "star");
    common::write(assets.path(), "js/app.js.gz", "compressed");
    let daemon = redfish_daemon(assets.path());

    let code = with_running(&daemon, |addr| async move {
        let index = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        assert_eq!(index.status(), 200);

        let script = reqwest::get(format!("http://{}/js/app.js", addr)).await.unwrap();
        assert_eq!(script.status(), 200);
        assert_eq!(script.headers()["content-encoding"], "gzip");
        assert_eq!(script.text().await.unwrap(), "compressed");
    })
    .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn protected_routes_need_credentials() {
    let assets = common::asset_dir();
    let daemon = redfish_daemon(assets.path());

    let code = with_running(&daemon, |addr| async move {
        let client = reqwest::Client::new();
        let url = format!("http://{}/redfish/v1/EventService", addr);

        let anonymous = client.get(&url).send().await.unwrap();
        assert_eq!(anonymous.status(), 401);

        let wrong = client.get(&url).bearer_auth("nope").send().await.unwrap();
        assert_eq!(wrong.status(), 401);

        let ok = client.get(&url).bearer_auth(API_KEY).send().await.unwrap();
        assert_eq!(ok.status(), 200);

        let bus: Value = client
            .get(format!("http://{}/bus/system/", addr))
            .bearer_auth(API_KEY)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(bus["status"], "ok");
    })
    .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn session_login_and_logout() {
    let assets = common::asset_dir();
    let daemon = redfish_daemon(assets.path());

    let code = with_running(&daemon, |addr| async move {
        let client = reqwest::Client::new();

        let login: Value = client
            .post(format!("http://{}/login", addr))
            .json(&json!({ "username": "admin", "password": API_KEY }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = login["token"].as_str().unwrap().to_string();

        let ibm = client
            .get(format!("http://{}/ibm/v1", addr))
            .header("X-Auth-Token", &token)
            .send()
            .await
            .unwrap();
        assert_eq!(ibm.status(), 200);

        let logout = client
            .post(format!("http://{}/logout", addr))
            .header("X-Auth-Token", &token)
            .send()
            .await
            .unwrap();
        assert_eq!(logout.status(), 204);

        let after = client
            .get(format!("http://{}/ibm/v1", addr))
            .header("X-Auth-Token", &token)
            .send()
            .await
            .unwrap();
        assert_eq!(after.status(), 401);
    })
    .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn every_response_carries_security_headers() {
    let assets = common::asset_dir();
    let daemon = redfish_daemon(assets.path());

    let code = with_running(&daemon, |addr| async move {
        for path in ["/", "/redfish/v1", "/bus/", "/missing"] {
            let response = reqwest::get(format!("http://{}{}", addr, path)).await.unwrap();
            let headers = response.headers();
            assert_eq!(headers["x-frame-options"], "DENY", "{}", path);
            assert!(headers.contains_key("strict-transport-security"), "{}", path);
            assert!(headers.contains_key("content-security-policy"), "{}", path);
            assert!(headers.contains_key("x-request-id"), "{}", path);
        }
    })
    .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn disabling_xss_prevention_allows_cross_origin() {
    let daemon = Daemon::new(test_config(FeatureFlags {
        redfish: true,
        insecure_disable_xss_prevention: true,
        ..FeatureFlags::default()
    }))
    .with_activation(FakeActivation::none());

    let code = with_running(&daemon, |addr| async move {
        let preflight = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("http://{}/redfish/v1", addr))
            .header("Origin", "http://localhost:8080")
            .header("Access-Control-Request-Method", "GET")
            .send()
            .await
            .unwrap();
        assert!(preflight.status().is_success());
        assert_eq!(
            preflight.headers()["access-control-allow-origin"],
            "http://localhost:8080"
        );

        let root = reqwest::get(format!("http://{}/redfish/v1", addr)).await.unwrap();
        assert!(!root.headers().contains_key("content-security-policy"));
    })
    .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn unattached_console_closes_with_reason() {
    let assets = common::asset_dir();
    let daemon = redfish_daemon(assets.path());

    let code = with_running(&daemon, |addr| async move {
        let mut request = format!("ws://{}/console0", addr).into_client_request().unwrap();
        request
            .headers_mut()
            .insert("Authorization", format!("Bearer {}", API_KEY).parse().unwrap());
        let (mut socket, _) = tokio_tungstenite::connect_async(request).await.unwrap();

        match socket.next().await {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), 1011);
                assert!(frame.reason.contains("host_console"));
            }
            other => panic!("expected close frame, got {:?}", other),
        }
        let _ = socket.close(None).await;
    })
    .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn websocket_without_credentials_is_rejected() {
    let assets = common::asset_dir();
    let daemon = redfish_daemon(assets.path());

    let code = with_running(&daemon, |addr| async move {
        let result = tokio_tungstenite::connect_async(format!("ws://{}/console0", addr)).await;
        assert!(result.is_err());
    })
    .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn lock_service_conflicts_until_holder_logs_out() {
    let assets = common::asset_dir();
    let daemon = redfish_daemon(assets.path());

    let code = with_running(&daemon, |addr| async move {
        let client = reqwest::Client::new();
        let mut tokens = Vec::new();
        for user in ["alice", "bob"] {
            let login: Value = client
                .post(format!("http://{}/login", addr))
                .json(&json!({ "username": user, "password": API_KEY }))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            tokens.push(login["token"].as_str().unwrap().to_string());
        }

        let acquire = format!(
            "http://{}/ibm/v1/HMC/LockService/Actions/LockService.AcquireLock",
            addr
        );
        let body = json!({ "ResourceId": "/xyz/openbmc_project/dump", "LockType": "Write" });

        let first = client
            .post(&acquire)
            .header("X-Auth-Token", &tokens[0])
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(first.status(), 200);

        let second = client
            .post(&acquire)
            .header("X-Auth-Token", &tokens[1])
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(second.status(), 409);

        let logout = client
            .post(format!("http://{}/logout", addr))
            .header("X-Auth-Token", &tokens[0])
            .send()
            .await
            .unwrap();
        assert_eq!(logout.status(), 204);

        let after_logout = client
            .post(&acquire)
            .header("X-Auth-Token", &tokens[1])
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(after_logout.status(), 200);
    })
    .await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn signal_websocket_forwards_matching_signals() {
    use mgmtd::bus::{BusConnection, LocalBus, Signal};

    let bus = LocalBus::default();
    let daemon_bus = bus.clone();
    let daemon = Daemon::new(test_config(FeatureFlags {
        event_subscription_websocket: true,
        ..FeatureFlags::default()
    }))
    .with_activation(FakeActivation::none())
    .with_bus(move || Ok(Box::new(daemon_bus.clone()) as Box<dyn BusConnection>));

    let code = with_running(&daemon, |addr| async move {
        let mut request = format!("ws://{}/subscribe", addr).into_client_request().unwrap();
        request
            .headers_mut()
            .insert("Authorization", format!("Bearer {}", API_KEY).parse().unwrap());
        let (mut socket, _) = tokio_tungstenite::connect_async(request).await.unwrap();

        let filter = json!({ "paths": ["/xyz/openbmc_project/sensors"] });
        socket.send(Message::text(filter.to_string())).await.unwrap();

        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(20));
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        bus.emit(Signal::new("/xyz/openbmc_project/state/host0", "a.B", "Ignored")).unwrap();
                        bus.emit(
                            Signal::new(
                                "/xyz/openbmc_project/sensors/temperature/cpu0",
                                "xyz.openbmc_project.Sensor.Value",
                                "PropertiesChanged",
                            )
                            .with_body(json!({ "Value": 42.0 })),
                        )
                        .unwrap();
                    }
                    message = socket.next() => {
                        break message;
                    }
                }
            }
        })
        .await
        .unwrap();

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            other => panic!("expected text frame, got {:?}", other),
        };
        let event: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(event["path"], "/xyz/openbmc_project/sensors/temperature/cpu0");
        assert_eq!(event["properties"]["Value"], 42.0);
        let _ = socket.close(None).await;
    })
    .await;
    assert_eq!(code, 0);
}
