use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::HueSettings;
use crate::effects::LightControl;

#[derive(Debug, thiserror::Error)]
pub enum LightError {
    #[error("could not reach hue bridge: {0}")]
    Http(#[from] reqwest::Error),
    #[error("hue bridge refused the request: {0}")]
    Bridge(String),
    #[error("no light called {0:?} on the bridge")]
    UnknownLight(String),
}

/// Body of `PUT /lights/<id>/state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LightState {
    pub on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<u16>,
}

impl LightState {
    /// Scene used while the speaker is playing.
    pub fn active() -> Self {
        LightState {
            on: true,
            bri: Some(254),
            sat: Some(120),
            hue: Some(100),
            transitiontime: Some(5),
        }
    }

    pub fn off() -> Self {
        LightState {
            on: false,
            bri: None,
            sat: None,
            hue: None,
            transitiontime: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LightInfo {
    name: String,
}

pub struct HueClient {
    client: reqwest::Client,
    base_url: String,
    light_id: String,
}

impl HueClient {
    /// Connect to the bridge and resolve the configured light (id or name).
    pub async fn connect(settings: &HueSettings) -> Result<Self, LightError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        let base_url = format!("http://{}/api/{}", settings.bridge, settings.username);

        let body: Value = client
            .get(format!("{}/lights", base_url))
            .send()
            .await?
            .json()
            .await?;
        check_response(&body)?;
        let lights: HashMap<String, LightInfo> =
            serde_json::from_value(body).map_err(|err| LightError::Bridge(err.to_string()))?;
        let light_id = find_light(&lights, &settings.light)
            .ok_or_else(|| LightError::UnknownLight(settings.light.clone()))?;

        info!("Using hue light {} on bridge {}", light_id, settings.bridge);
        Ok(HueClient {
            client,
            base_url,
            light_id,
        })
    }
}

#[async_trait]
impl LightControl for HueClient {
    async fn set_light(&self, state: &LightState) -> Result<(), LightError> {
        debug!("Setting hue light {} to {:?}", self.light_id, state);
        let body: Value = self
            .client
            .put(format!("{}/lights/{}/state", self.base_url, self.light_id))
            .json(state)
            .send()
            .await?
            .json()
            .await?;
        check_response(&body)
    }
}

fn find_light(lights: &HashMap<String, LightInfo>, wanted: &str) -> Option<String> {
    if lights.contains_key(wanted) {
        return Some(wanted.to_string());
    }
    lights
        .iter()
        .find(|(_, info)| info.name == wanted)
        .map(|(id, _)| id.clone())
}

/// The bridge answers 200 with a list of `{"error": {...}}` entries on failure.
fn check_response(body: &Value) -> Result<(), LightError> {
    let errors: Vec<String> = body
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("error"))
        .map(|error| {
            error
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string()
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(LightError::Bridge(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt as _, AsyncReadExt as _, AsyncWriteExt as _, BufReader};
    use tokio::net::TcpListener;

    use super::*;

    /// Serves one canned JSON body per connection, in order, and returns each
    /// request as `METHOD path body`.
    async fn fake_bridge(replies: Vec<Value>) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            for reply in replies {
                let (stream, _) = listener.accept().await.unwrap();
                let mut stream = BufReader::new(stream);

                let mut request_line = String::new();
                stream.read_line(&mut request_line).await.unwrap();
                let mut content_length = 0;
                loop {
                    let mut header = String::new();
                    stream.read_line(&mut header).await.unwrap();
                    let header = header.trim_end();
                    if header.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = header.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut body = vec![0; content_length];
                stream.read_exact(&mut body).await.unwrap();

                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default();
                let path = parts.next().unwrap_or_default();
                seen.push(format!(
                    "{} {} {}",
                    method,
                    path,
                    String::from_utf8(body).unwrap()
                ));

                let payload = reply.to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                );
                let stream = stream.get_mut();
                stream.write_all(response.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
            seen
        });
        (port, handle)
    }

    fn bridge_settings(port: u16, light: &str) -> HueSettings {
        HueSettings {
            bridge: format!("127.0.0.1:{}", port),
            username: "newdeveloper".to_string(),
            light: light.to_string(),
        }
    }

    fn lights() -> Value {
        json!({
            "1": {"name": "Hallway", "type": "Dimmable light"},
            "3": {"name": "Kitchen", "type": "Extended color light"},
        })
    }

    #[test]
    fn test_light_state_body() {
        assert_eq!(
            serde_json::to_value(LightState::active()).unwrap(),
            json!({"on": true, "bri": 254, "sat": 120, "hue": 100, "transitiontime": 5})
        );
        assert_eq!(
            serde_json::to_value(LightState::off()).unwrap(),
            json!({"on": false})
        );
    }

    #[test]
    fn test_check_response() {
        assert!(check_response(&json!([{"success": {"/lights/1/state/on": true}}])).is_ok());
        assert!(check_response(&json!({"1": {"name": "Lamp"}})).is_ok());

        match check_response(&json!([
            {"error": {"type": 1, "description": "unauthorized user"}}
        ])) {
            Err(LightError::Bridge(msg)) => assert_eq!(msg, "unauthorized user"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_find_light() {
        let lights: HashMap<String, LightInfo> = serde_json::from_value(json!({
            "1": {"name": "Hallway", "type": "Dimmable light"},
            "3": {"name": "Kitchen", "type": "Extended color light"},
        }))
        .unwrap();
        assert_eq!(find_light(&lights, "1").as_deref(), Some("1"));
        assert_eq!(find_light(&lights, "Kitchen").as_deref(), Some("3"));
        assert_eq!(find_light(&lights, "Garage"), None);
    }

    #[tokio::test]
    async fn test_connect_by_name_then_switch_off() {
        let (port, bridge) = fake_bridge(vec![
            lights(),
            json!([{"success": {"/lights/3/state/on": false}}]),
        ])
        .await;

        let client = HueClient::connect(&bridge_settings(port, "Kitchen"))
            .await
            .unwrap();
        client.set_light(&LightState::off()).await.unwrap();

        assert_eq!(
            bridge.await.unwrap(),
            vec![
                "GET /api/newdeveloper/lights ",
                "PUT /api/newdeveloper/lights/3/state {\"on\":false}",
            ]
        );
    }

    #[tokio::test]
    async fn test_bridge_error_on_set() {
        let rejected = json!([
            {"error": {"type": 201, "description": "parameter, bri, is not modifiable"}}
        ]);
        let (port, _bridge) = fake_bridge(vec![lights(), rejected]).await;

        let client = HueClient::connect(&bridge_settings(port, "1"))
            .await
            .unwrap();
        match client.set_light(&LightState::active()).await {
            Err(LightError::Bridge(msg)) => {
                assert_eq!(msg, "parameter, bri, is not modifiable")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_light() {
        let (port, _bridge) = fake_bridge(vec![lights()]).await;
        match HueClient::connect(&bridge_settings(port, "Garage")).await {
            Err(LightError::UnknownLight(name)) => assert_eq!(name, "Garage"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_connect_unauthorized_user() {
        let (port, _bridge) = fake_bridge(vec![json!([
            {"error": {"type": 1, "address": "/lights", "description": "unauthorized user"}}
        ])])
        .await;
        match HueClient::connect(&bridge_settings(port, "1")).await {
            Err(LightError::Bridge(msg)) => assert_eq!(msg, "unauthorized user"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_connect_unreachable_bridge() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        match HueClient::connect(&bridge_settings(port, "1")).await {
            Err(LightError::Http(_)) => {}
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
