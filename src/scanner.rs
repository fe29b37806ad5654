use std::collections::HashSet;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use btleplug::api::{BDAddr, Central, CentralEvent, Manager as _, Peripheral as _};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{Stream, StreamExt};
use stream_cancel::{Trigger, Valved};
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::time::Instant;
use tokio_stream::wrappers::BroadcastStream;

use crate::link::NameFilter;
use crate::{Device, Error, Result};

pub type DeviceStream = Valved<Pin<Box<dyn Stream<Item = Device> + Send>>>;

/// What the scan task publishes to device streams.
#[derive(Clone)]
enum ScanItem<T> {
    Found(T),
    /// The scan reached a stop condition. Sent after every `Found`.
    Finished,
}

/// Yields found items in order and ends after `Finished`, so items sent
/// before the end of the scan are never lost. The valve is only for
/// [`Scanner::stop`].
fn feed<T>(
    receiver: Receiver<ScanItem<T>>,
    stoppers: &RwLock<Vec<Trigger>>,
) -> Valved<Pin<Box<dyn Stream<Item = T> + Send>>>
where
    T: Clone + Send + 'static,
{
    let stream: Pin<Box<dyn Stream<Item = T> + Send>> = Box::pin(
        BroadcastStream::new(receiver)
            .filter_map(|x| async move { x.ok() })
            .take_while(|item| futures::future::ready(matches!(item, ScanItem::Found(_))))
            .filter_map(|item| async move {
                match item {
                    ScanItem::Found(value) => Some(value),
                    ScanItem::Finished => None,
                }
            }),
    );

    let (trigger, stream) = Valved::new(stream);
    stoppers.write().unwrap().push(trigger);

    stream
}

#[derive(Default)]
pub struct ScanConfig {
    /// Index of the Bluetooth adapter to use. The first found adapter is used by default.
    adapter_index: usize,
    /// Filters the found devices based on device address.
    address_filter: Option<Box<dyn Fn(BDAddr) -> bool + Send + Sync>>,
    /// Filters the found devices based on local name.
    name_filter: Option<NameFilter>,
    /// Maximum results before the scan is stopped.
    max_results: Option<usize>,
    /// The scan is stopped when timeout duration is reached.
    timeout: Option<Duration>,
}

impl ScanConfig {
    /// Index of bluetooth adapter to use
    pub fn adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Filter scanned devices based on the device address
    pub fn filter_by_address(
        mut self,
        func: impl Fn(BDAddr) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.address_filter = Some(Box::new(func));
        self
    }

    /// Filter scanned devices based on the device name
    pub fn filter_by_name(mut self, func: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.name_filter = Some(Box::new(func));
        self
    }

    /// Stop the scan after given number of matches
    pub fn stop_after_matches(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn stop_after_first_match(self) -> Self {
        self.stop_after_matches(1)
    }

    pub fn stop_after_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Require that the scanned devices have a name
    pub fn require_name(self) -> Self {
        if self.name_filter.is_none() {
            self.filter_by_name(|name| !name.is_empty())
        } else {
            self
        }
    }
}

/// Keeps the manager alive for as long as any device found through it.
pub(crate) struct AdapterContext {
    pub(crate) _manager: Manager,
    pub(crate) adapter: Adapter,
}

pub struct Scanner {
    context: Option<Arc<AdapterContext>>,
    device_sender: Sender<ScanItem<Device>>,
    scan_stopper: Option<Trigger>,
    stream_stoppers: RwLock<Vec<Trigger>>,
}

impl Default for Scanner {
    fn default() -> Self {
        Scanner::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        let (device_sender, _) = broadcast::channel(16);

        Self {
            context: None,
            device_sender,
            scan_stopper: None,
            stream_stoppers: RwLock::new(Vec::new()),
        }
    }

    /// Start scanning for ble devices.
    pub async fn start(&mut self, config: ScanConfig) -> Result<()> {
        if self.context.is_some() {
            log::info!("Scanner is already started.");
            return Ok(());
        }

        let manager = Manager::new().await?;
        let mut adapters = manager.adapters().await?;

        if config.adapter_index >= adapters.len() {
            return Err(Error::AdapterNotFound(config.adapter_index));
        }

        let adapter = adapters.swap_remove(config.adapter_index);

        log::trace!("Using adapter: {:?}", adapter);

        let context = Arc::new(AdapterContext {
            _manager: manager,
            adapter,
        });
        let stopper = ScanTask::start(
            config,
            context.clone(),
            self.device_sender.clone(),
        )
        .await?;

        self.scan_stopper = Some(stopper);
        self.context = Some(context);

        Ok(())
    }

    /// Stop scanning for ble devices.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(context) = self.context.take() {
            self.scan_stopper.take();
            self.stream_stoppers.write().unwrap().clear();
            context.adapter.stop_scan().await?;
        } else {
            log::info!("Scanner is already stopped");
        }

        Ok(())
    }

    /// Create a new stream that receives matching devices.
    ///
    /// The stream ends after the last match once a stop condition is
    /// reached, or immediately on [`stop`](Scanner::stop). Create it before
    /// [`start`](Scanner::start) to see every match.
    pub fn device_stream(&mut self) -> DeviceStream {
        feed(self.device_sender.subscribe(), &self.stream_stoppers)
    }
}

struct ScanTask {
    /// Number of matching devices found so far
    result_count: usize,
    context: Arc<AdapterContext>,
    config: ScanConfig,
    /// Devices that have already been accepted or rejected
    seen: HashSet<PeripheralId>,
    sender: Sender<ScanItem<Device>>,
}

impl ScanTask {
    async fn start(
        config: ScanConfig,
        context: Arc<AdapterContext>,
        sender: Sender<ScanItem<Device>>,
    ) -> Result<Trigger> {
        log::info!("Starting the scan");

        let (stopper, events) = Valved::new(context.adapter.events().await?);

        context.adapter.start_scan(Default::default()).await?;

        let task = ScanTask {
            result_count: 0,
            context,
            config,
            seen: HashSet::new(),
            sender,
        };

        tokio::spawn(async move {
            task.listen(events).await;
        });

        Ok(stopper)
    }

    async fn listen(
        mut self,
        mut events: Valved<Pin<Box<dyn Stream<Item = CentralEvent> + Send>>>,
    ) {
        let deadline = self.config.timeout.map(|timeout| Instant::now() + timeout);

        loop {
            let event = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, events.next()).await {
                    Ok(event) => event,
                    Err(_) => {
                        log::info!("Scan timed out.");
                        break;
                    }
                },
                None => events.next().await,
            };

            match event {
                Some(CentralEvent::DeviceDiscovered(id)) | Some(CentralEvent::DeviceUpdated(id)) => {
                    self.inspect(id).await;
                }
                Some(_) => {}
                None => break,
            }

            if self
                .config
                .max_results
                .map_or(false, |max_results| self.result_count >= max_results)
            {
                log::info!("Scanner stop condition reached.");
                break;
            }
        }

        // Fails only when nobody is listening
        self.sender.send(ScanItem::Finished).ok();

        log::info!("Scanner was stopped.");
    }

    async fn inspect(&mut self, id: PeripheralId) {
        if self.seen.contains(&id) {
            return;
        }

        let peripheral = match self.context.adapter.peripheral(&id).await {
            Ok(peripheral) => peripheral,
            Err(e) => {
                log::debug!("Could not look up peripheral {:?}: {:?}", id, e);
                return;
            }
        };

        log::trace!("Inspecting device: {:?}", peripheral);

        match self.matches(&peripheral).await {
            Some(true) => self.accept(peripheral),
            Some(false) => {
                self.seen.insert(id);
            }
            // Name not advertised yet, wait for an update
            None => {}
        }
    }

    fn accept(&mut self, peripheral: Peripheral) {
        self.seen.insert(peripheral.id());

        log::info!("Found device: {}", peripheral.address());

        let device = Device::new(self.context.clone(), peripheral);

        match self.sender.send(ScanItem::Found(device)) {
            Ok(_) => self.result_count += 1,
            Err(e) => log::error!("Failed to add device: {}", e),
        }
    }

    async fn matches(&self, peripheral: &Peripheral) -> Option<bool> {
        let mut passed = true;

        if let Some(filter_by_addr) = self.config.address_filter.as_ref() {
            passed &= filter_by_addr(peripheral.address());
        }

        if let Some(filter_by_name) = self.config.name_filter.as_ref() {
            passed &= match peripheral.properties().await {
                Ok(Some(props)) => props.local_name.map(|name| filter_by_name(&name)),
                _ => None,
            }?;
        }

        Some(passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_name_keeps_existing_filter() {
        let config = ScanConfig::default()
            .filter_by_name(|name| name == "PowerUp")
            .require_name();
        let filter = config.name_filter.unwrap();

        assert!(filter("PowerUp"));
        assert!(!filter("Other"));
    }

    #[test]
    fn require_name_rejects_empty_names() {
        let filter = ScanConfig::default().require_name().name_filter.unwrap();

        assert!(filter("x"));
        assert!(!filter(""));
    }

    #[test]
    fn stop_conditions() {
        let config = ScanConfig::default()
            .adapter_index(2)
            .stop_after_first_match()
            .stop_after_timeout(Duration::from_secs(5));

        assert_eq!(config.adapter_index, 2);
        assert_eq!(config.max_results, Some(1));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn match_sent_right_before_finish_is_delivered() {
        let (sender, _) = broadcast::channel(16);
        let stoppers = Arc::new(RwLock::new(Vec::new()));
        let mut stream = feed(sender.subscribe(), &stoppers);

        tokio::spawn(async move {
            sender.send(ScanItem::Found(7u32)).ok();
            sender.send(ScanItem::Finished).ok();
        })
        .await
        .unwrap();

        assert_eq!(stream.next().await, Some(7));
        assert_eq!(stream.next().await, None);
        assert_eq!(stoppers.read().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finish_without_match_ends_stream() {
        let (sender, _) = broadcast::channel::<ScanItem<u32>>(16);
        let stoppers = RwLock::new(Vec::new());
        let mut stream = feed(sender.subscribe(), &stoppers);

        sender.send(ScanItem::Finished).ok();

        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn stop_cuts_off_pending_matches() {
        let (sender, _) = broadcast::channel(16);
        let stoppers = RwLock::new(Vec::new());
        let mut stream = feed(sender.subscribe(), &stoppers);

        sender.send(ScanItem::Found(1u32)).ok();
        stoppers.write().unwrap().clear();

        assert_eq!(stream.next().await, None);
    }
}
