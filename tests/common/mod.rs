//! In-memory link used to drive a `Session` without a bluetooth adapter.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use powerup::{
    CharPropFlags, CharacteristicInfo, Error, Link, LinkClient, NameFilter, NotificationStream,
    Result,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Discover(Duration),
    Open(String),
    Write(Uuid, Vec<u8>),
    Read(Uuid),
    Subscribe(Uuid),
    Characteristics,
    Close,
}

#[derive(Default)]
struct State {
    /// Advertised names, in discovery order
    advertised: Vec<String>,
    calls: Vec<Call>,
    values: HashMap<Uuid, Vec<u8>>,
    failing_reads: Vec<Uuid>,
    characteristics: Vec<CharacteristicInfo>,
    fail_open: bool,
    fail_close: bool,
    link_lost: bool,
    discover_delay: Option<Duration>,
    notifier: Option<UnboundedSender<Vec<u8>>>,
}

#[derive(Clone, Default)]
pub struct MockClient {
    state: Arc<Mutex<State>>,
}

impl MockClient {
    pub fn advertising(names: &[&str]) -> Self {
        let client = Self::default();
        client.state.lock().unwrap().advertised = names.iter().map(|n| n.to_string()).collect();
        client
    }

    pub fn set_value(&self, uuid: Uuid, value: &[u8]) {
        self.state.lock().unwrap().values.insert(uuid, value.to_vec());
    }

    pub fn fail_reads_of(&self, uuid: Uuid) {
        self.state.lock().unwrap().failing_reads.push(uuid);
    }

    pub fn add_characteristic(&self, service: Uuid, uuid: Uuid, properties: CharPropFlags) {
        self.state
            .lock()
            .unwrap()
            .characteristics
            .push(CharacteristicInfo {
                service,
                uuid,
                properties,
            });
    }

    pub fn fail_open(&self) {
        self.state.lock().unwrap().fail_open = true;
    }

    pub fn fail_close(&self) {
        self.state.lock().unwrap().fail_close = true;
    }

    /// Make every later write and read fail as if the device went away.
    pub fn lose_link(&self) {
        self.state.lock().unwrap().link_lost = true;
    }

    pub fn set_discover_delay(&self, delay: Duration) {
        self.state.lock().unwrap().discover_delay = Some(delay);
    }

    /// End the subscribed notification stream.
    pub fn end_notifications(&self) {
        self.state.lock().unwrap().notifier = None;
    }

    /// Deliver a notification to the subscribed stream, if any.
    pub fn notify(&self, value: &[u8]) -> bool {
        match self.state.lock().unwrap().notifier.as_ref() {
            Some(sender) => sender.send(value.to_vec()).is_ok(),
            None => false,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write(uuid, data) => Some((uuid, data)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

pub struct MockPeer {
    address: String,
}

pub struct MockLink {
    client: MockClient,
    address: String,
}

#[async_trait]
impl LinkClient for MockClient {
    type Peer = MockPeer;
    type Link = MockLink;

    async fn discover(&self, filter: NameFilter, timeout: Duration) -> Result<Option<MockPeer>> {
        self.record(Call::Discover(timeout));

        let delay = self.state.lock().unwrap().discover_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock().unwrap();
        Ok(state
            .advertised
            .iter()
            .position(|name| filter(name.as_str()))
            .map(|index| MockPeer {
                address: format!("00:00:00:00:00:{:02X}", index),
            }))
    }

    async fn open(&self, peer: MockPeer) -> Result<MockLink> {
        self.record(Call::Open(peer.address.clone()));

        if self.state.lock().unwrap().fail_open {
            return Err(Error::Transport(btleplug::Error::DeviceNotFound));
        }

        Ok(MockLink {
            client: self.clone(),
            address: peer.address,
        })
    }
}

#[async_trait]
impl Link for MockLink {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        self.client.record(Call::Write(uuid, data.to_vec()));

        if self.client.state.lock().unwrap().link_lost {
            return Err(Error::Transport(btleplug::Error::NotConnected));
        }
        Ok(())
    }

    async fn read(&self, uuid: Uuid) -> Result<Vec<u8>> {
        self.client.record(Call::Read(uuid));

        let state = self.client.state.lock().unwrap();
        if state.link_lost || state.failing_reads.contains(&uuid) {
            return Err(Error::Transport(btleplug::Error::NotConnected));
        }
        state
            .values
            .get(&uuid)
            .cloned()
            .ok_or(Error::CharacteristicNotFound(uuid))
    }

    async fn subscribe(&self, uuid: Uuid) -> Result<NotificationStream> {
        self.client.record(Call::Subscribe(uuid));

        let (sender, receiver) = unbounded_channel();
        self.client.state.lock().unwrap().notifier = Some(sender);

        Ok(Box::pin(UnboundedReceiverStream::new(receiver)))
    }

    async fn characteristics(&self) -> Result<Vec<CharacteristicInfo>> {
        self.client.record(Call::Characteristics);
        Ok(self.client.state.lock().unwrap().characteristics.clone())
    }

    async fn close(&self) -> Result<()> {
        self.client.record(Call::Close);

        if self.client.state.lock().unwrap().fail_close {
            return Err(Error::Transport(btleplug::Error::NotConnected));
        }
        Ok(())
    }
}
