use async_trait::async_trait;
use futures::StreamExt as _;
use log::{debug, error, info, warn};
use mac_address::MacAddress;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use zbus::fdo::PropertiesProxy;
use zbus::zvariant::Value;

use crate::connector::{ConnectOutcome, LinkConnector};
use crate::messages::LinkEvent;

const BLUEZ: &str = "org.bluez";
const DEVICE_INTERFACE: &str = "org.bluez.Device1";
const A2DP_SINK_UUID: &str = "0000110b-0000-1000-8000-00805f9b34fb";

#[derive(Debug, thiserror::Error)]
pub enum BluezError {
    #[error("d-bus error: {0}")]
    Bus(#[from] zbus::Error),
    #[error("d-bus error: {0}")]
    Fdo(#[from] zbus::fdo::Error),
    #[error("speaker {address} is not known to adapter {adapter} (pair it first): {source}")]
    DeviceNotFound {
        address: MacAddress,
        adapter: String,
        #[source]
        source: zbus::Error,
    },
}

/// Object path bluez uses for a device, e.g. `/org/bluez/hci0/dev_00_11_22_33_44_55`.
pub fn device_path(adapter: &str, address: &MacAddress) -> String {
    format!(
        "/org/bluez/{}/dev_{}",
        adapter,
        address.to_string().to_uppercase().replace(':', "_")
    )
}

/// The watched speaker as seen through bluez on the system bus.
pub struct BluezDevice {
    connection: zbus::Connection,
    path: String,
    device: zbus::Proxy<'static>,
}

impl BluezDevice {
    /// Look the speaker up on the given adapter. Fails if bluez does not know it.
    pub async fn find(
        connection: &zbus::Connection,
        adapter: &str,
        address: MacAddress,
    ) -> Result<Self, BluezError> {
        let path = device_path(adapter, &address);
        let device = zbus::Proxy::new(connection, BLUEZ, path.clone(), DEVICE_INTERFACE).await?;

        let reported: String = device
            .get_property("Address")
            .await
            .map_err(|source| BluezError::DeviceNotFound {
                address,
                adapter: adapter.to_string(),
                source,
            })?;
        info!(
            "Starting up, using bluetooth adapter {} for speaker {}",
            adapter, reported
        );

        Ok(BluezDevice {
            connection: connection.clone(),
            path,
            device,
        })
    }

    pub fn connector(&self) -> BluezConnector {
        BluezConnector {
            device: self.device.clone(),
        }
    }

    /// Subscribe to property changes on the device and forward every `Connected`
    /// flip as a [`LinkEvent`] tagged with the interface it changed on.
    pub async fn listen(
        &self,
        tx: mpsc::Sender<LinkEvent>,
    ) -> Result<JoinHandle<()>, BluezError> {
        let properties = PropertiesProxy::builder(&self.connection)
            .destination(BLUEZ)?
            .path(self.path.clone())?
            .build()
            .await?;
        let mut changes = properties.receive_properties_changed().await?;
        debug!("Listening for connection changes on {}", self.path);

        Ok(tokio::spawn(async move {
            // keep the proxy alive as long as the stream
            let _properties = properties;
            while let Some(signal) = changes.next().await {
                let args = match signal.args() {
                    Ok(args) => args,
                    Err(err) => {
                        warn!("Ignoring malformed PropertiesChanged signal: {}", err);
                        continue;
                    }
                };
                let Some(event) = link_event(
                    args.interface_name().as_str(),
                    args.changed_properties().get("Connected"),
                ) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    debug!("Link event receiver gone, stopping listener");
                    return;
                }
            }
            error!("Lost the bluez signal stream");
        }))
    }
}

fn link_event(interface: &str, connected: Option<&Value<'_>>) -> Option<LinkEvent> {
    match bool::try_from(connected?).ok()? {
        true => Some(LinkEvent::established(interface)),
        false => Some(LinkEvent::lost(interface)),
    }
}

pub struct BluezConnector {
    device: zbus::Proxy<'static>,
}

#[async_trait]
impl LinkConnector for BluezConnector {
    async fn connect(&self) -> ConnectOutcome {
        match self
            .device
            .call_method("ConnectProfile", &(A2DP_SINK_UUID,))
            .await
        {
            Ok(_) => ConnectOutcome::Success,
            Err(zbus::Error::MethodError(name, detail, _)) => {
                ConnectOutcome::from_error_name(name.as_str(), detail)
            }
            Err(other) => ConnectOutcome::FatalError {
                name: "transport".to_string(),
                detail: Some(other.to_string()),
            },
        }
    }
}
